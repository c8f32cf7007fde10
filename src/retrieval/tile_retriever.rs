use crate::{
    addressing::{ScratchBuffer, TileAddressingScheme},
    cache::{AbsentResourceList, GpuResourceCache},
    config::RetrievalConfig,
    error::ResourceError,
    math::Sector,
    retrieval::ImageSource,
};
use async_channel::{Receiver, Sender};
use bevy::{
    log::{debug, warn},
    tasks::AsyncComputeTaskPool,
    utils::HashMap,
};
use image::RgbaImage;
use slab::Slab;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A texture request for a single tile.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub cache_key: String,
    pub url: String,
    pub sector: Sector,
}

struct PendingRetrieval {
    cache_key: String,
    sector: Sector,
    superseded: Arc<AtomicBool>,
}

struct CompletedRetrieval {
    slot: usize,
    result: Result<RgbaImage, ResourceError>,
}

/// Fetches and decodes tile images in the background.
///
/// Requests are spawned on the [`AsyncComputeTaskPool`] and report back over a channel.
/// The results are moved into the texture cache by [`TileRetriever::process_completed`],
/// which runs on the render thread, so the cache only ever has a single writer.
pub struct TileRetriever {
    source: Arc<dyn ImageSource>,
    pending: Slab<PendingRetrieval>,
    pending_keys: HashMap<String, usize>,
    sender: Sender<CompletedRetrieval>,
    receiver: Receiver<CompletedRetrieval>,
    absent: AbsentResourceList,
    max_concurrent: usize,
    discard_superseded: bool,
}

impl TileRetriever {
    pub fn new(source: Arc<dyn ImageSource>, config: &RetrievalConfig) -> Self {
        let (sender, receiver) = async_channel::unbounded();

        Self {
            source,
            pending: Slab::with_capacity(config.max_concurrent),
            pending_keys: HashMap::default(),
            sender,
            receiver,
            absent: AbsentResourceList::new(config.max_tries, config.min_check_interval_secs),
            max_concurrent: config.max_concurrent.max(1),
            discard_superseded: config.discard_superseded,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, cache_key: &str) -> bool {
        self.pending_keys.contains_key(cache_key)
    }

    pub fn is_absent(&self, cache_key: &str, now: f64) -> bool {
        self.absent.is_resource_absent(cache_key, now)
    }

    /// Flags every request in flight as superseded. Requests issued again before they
    /// complete are revived.
    pub fn supersede_pending(&mut self) {
        for (_, pending) in &self.pending {
            pending.superseded.store(true, Ordering::Relaxed);
        }
    }

    /// Starts fetching the image unless it is already in flight, known to be absent, or the
    /// concurrency limit is reached. Returns whether a new fetch was started.
    pub fn request(&mut self, request: RetrievalRequest, now: f64) -> bool {
        if let Some(&slot) = self.pending_keys.get(&request.cache_key) {
            self.pending[slot].superseded.store(false, Ordering::Relaxed);
            return false;
        }

        if self.pending.len() >= self.max_concurrent
            || self.absent.is_resource_absent(&request.cache_key, now)
        {
            return false;
        }

        let RetrievalRequest {
            cache_key,
            url,
            sector,
        } = request;

        let slot = self.pending.insert(PendingRetrieval {
            cache_key: cache_key.clone(),
            sector,
            superseded: Arc::new(AtomicBool::new(false)),
        });
        self.pending_keys.insert(cache_key, slot);

        let source = self.source.clone();
        let sender = self.sender.clone();

        AsyncComputeTaskPool::get()
            .spawn(async move {
                let result = fetch_and_decode(source.as_ref(), &url);

                // the retriever may be gone, in which case nobody wants the result
                let _ = sender.send(CompletedRetrieval { slot, result }).await;
            })
            .detach();

        true
    }

    /// Stores the images fetched since the last call in the cache and records failures.
    /// Returns the number of textures stored.
    pub fn process_completed(
        &mut self,
        scheme: &TileAddressingScheme,
        cache: &mut GpuResourceCache,
        scratch: &mut ScratchBuffer,
        now: f64,
    ) -> usize {
        let mut stored = 0;

        while let Ok(CompletedRetrieval { slot, result }) = self.receiver.try_recv() {
            let Some(pending) = self.pending.try_remove(slot) else {
                continue;
            };
            self.pending_keys.remove(&pending.cache_key);

            let superseded = pending.superseded.load(Ordering::Relaxed);

            match result {
                Ok(_) if self.discard_superseded && superseded => {
                    debug!("Discarded superseded image {}.", pending.cache_key);
                }
                Ok(image) => {
                    let texture =
                        scheme.texture_for_fetched_image(image, &pending.sector, scratch);

                    self.absent.unmark_resource_absent(&pending.cache_key);
                    if cache.put_texture(pending.cache_key, texture) {
                        stored += 1;
                    }
                }
                Err(error) => {
                    warn!("{error}");
                    self.absent.mark_resource_absent(&pending.cache_key, now);
                }
            }
        }

        stored
    }
}

fn fetch_and_decode(source: &dyn ImageSource, url: &str) -> Result<RgbaImage, ResourceError> {
    let bytes = source.fetch(url).map_err(|error| ResourceError::Fetch {
        url: url.to_string(),
        message: format!("{error:#}"),
    })?;

    let image = image::load_from_memory(&bytes).map_err(|error| ResourceError::Decode {
        url: url.to_string(),
        message: error.to_string(),
    })?;

    Ok(image.to_rgba8())
}
