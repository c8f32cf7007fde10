use bevy::{
    log::{debug, warn},
    utils::HashMap,
};
use slab::Slab;

struct CacheEntry<R> {
    key: String,
    resource: R,
    size: usize,
    // towards the most recently used entry
    previous: Option<usize>,
    // towards the least recently used entry
    next: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entry_count: usize,
    pub used_capacity: usize,
}

/// A key to resource store limited by the total byte size of its resources.
///
/// When an insertion pushes the used capacity above the capacity, the least recently used
/// entries are evicted until the used capacity drops to the low water mark.
/// Lookups and insertions are O(1): the entries live in a [`Slab`] and are threaded onto an
/// intrusive recency list.
pub struct ResourceCache<R> {
    entries: Slab<CacheEntry<R>>,
    indices: HashMap<String, usize>,
    most_recent: Option<usize>,
    least_recent: Option<usize>,
    capacity: usize,
    low_water: usize,
    used_capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<R> ResourceCache<R> {
    pub fn new(capacity: usize) -> Self {
        Self::with_low_water(capacity, capacity)
    }

    pub fn with_low_water(capacity: usize, low_water: usize) -> Self {
        Self {
            entries: Slab::new(),
            indices: HashMap::default(),
            most_recent: None,
            least_recent: None,
            capacity,
            low_water: low_water.min(capacity),
            used_capacity: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn low_water(&self) -> usize {
        self.low_water
    }

    pub fn used_capacity(&self) -> usize {
        self.used_capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.indices.contains_key(key)
    }

    /// Looks up the resource and marks it as the most recently used one.
    pub fn resource_for_key(&mut self, key: &str) -> Option<&R> {
        let Some(&index) = self.indices.get(key) else {
            self.misses += 1;
            return None;
        };

        self.hits += 1;
        self.detach(index);
        self.attach_front(index);

        Some(&self.entries[index].resource)
    }

    /// Stores the resource under the key, replacing any previous resource.
    ///
    /// Returns `false` if the resource alone exceeds the capacity, in which case it is
    /// not stored.
    pub fn put_resource(&mut self, key: impl Into<String>, resource: R, size: usize) -> bool {
        let key = key.into();

        if size > self.capacity {
            warn!(
                "Resource {key} of {size} bytes exceeds the cache capacity of {} bytes.",
                self.capacity
            );
            return false;
        }

        self.remove_resource(&key);

        if self.used_capacity + size > self.capacity {
            self.make_space(self.low_water.saturating_sub(size));
        }

        let index = self.entries.insert(CacheEntry {
            key: key.clone(),
            resource,
            size,
            previous: None,
            next: None,
        });
        self.indices.insert(key, index);
        self.attach_front(index);
        self.used_capacity += size;

        true
    }

    pub fn remove_resource(&mut self, key: &str) -> Option<R> {
        let index = self.indices.remove(key)?;
        self.detach(index);

        let entry = self.entries.remove(index);
        self.used_capacity -= entry.size;

        Some(entry.resource)
    }

    pub fn set_capacity(&mut self, capacity: usize, low_water: usize) {
        self.capacity = capacity;
        self.low_water = low_water.min(capacity);

        if self.used_capacity > self.capacity {
            self.make_space(self.low_water);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.indices.clear();
        self.most_recent = None;
        self.least_recent = None;
        self.used_capacity = 0;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            entry_count: self.entries.len(),
            used_capacity: self.used_capacity,
        }
    }

    fn make_space(&mut self, target: usize) {
        while self.used_capacity > target {
            let Some(index) = self.least_recent else {
                break;
            };

            self.detach(index);
            let entry = self.entries.remove(index);
            self.indices.remove(&entry.key);
            self.used_capacity -= entry.size;
            self.evictions += 1;

            debug!("Evicted resource {} of {} bytes.", entry.key, entry.size);
        }
    }

    fn detach(&mut self, index: usize) {
        let (previous, next) = {
            let entry = &mut self.entries[index];
            (entry.previous.take(), entry.next.take())
        };

        match previous {
            Some(previous) => self.entries[previous].next = next,
            None => self.most_recent = next,
        }

        match next {
            Some(next) => self.entries[next].previous = previous,
            None => self.least_recent = previous,
        }
    }

    fn attach_front(&mut self, index: usize) {
        self.entries[index].next = self.most_recent;

        match self.most_recent {
            Some(most_recent) => self.entries[most_recent].previous = Some(index),
            None => self.least_recent = Some(index),
        }

        self.most_recent = Some(index);
    }
}
