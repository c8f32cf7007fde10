use bevy::{log::info, utils::HashMap};

#[derive(Debug, Clone, Copy)]
struct AbsentEntry {
    tries: u32,
    last_failure: f64,
}

/// Remembers resources that failed to load, so they are not requested again every frame.
///
/// A failed resource is considered absent until `min_check_interval` seconds have passed
/// since its last failure. After `max_tries` failures it stays absent for good.
#[derive(Debug, Clone)]
pub struct AbsentResourceList {
    max_tries: u32,
    min_check_interval: f64,
    entries: HashMap<String, AbsentEntry>,
}

impl AbsentResourceList {
    pub fn new(max_tries: u32, min_check_interval: f64) -> Self {
        Self {
            max_tries: max_tries.max(1),
            min_check_interval,
            entries: HashMap::default(),
        }
    }

    pub fn mark_resource_absent(&mut self, key: &str, now: f64) {
        let entry = self.entries.entry(key.to_string()).or_insert(AbsentEntry {
            tries: 0,
            last_failure: now,
        });
        entry.tries += 1;
        entry.last_failure = now;

        if entry.tries == self.max_tries {
            info!("Giving up on resource {key} after {} failed tries.", entry.tries);
        }
    }

    pub fn unmark_resource_absent(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn is_resource_absent(&self, key: &str, now: f64) -> bool {
        self.entries.get(key).is_some_and(|entry| {
            entry.tries >= self.max_tries || now - entry.last_failure < self.min_check_interval
        })
    }

    pub fn is_permanently_absent(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.tries >= self.max_tries)
    }
}
