//! Async thumbnail loading with request coalescing and cancellation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Semaphore, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn};

use crate::api::HttpTransport;
use crate::models::PhotoRecord;

use super::cache::LruStore;
use super::downsample::decode_thumbnail;
use super::{CacheKey, ImageError, SharedThumbnail, TargetSize, Thumbnail, scale_to_width};

type Waiter = oneshot::Sender<Result<SharedThumbnail, ImageError>>;

/// Bounds and concurrency of an [`ImageCache`]
#[derive(Debug, Clone)]
pub struct ImageCacheConfig {
    /// Maximum summed decoded size of resident thumbnails, in bytes
    pub max_total_cost: usize,
    /// Maximum number of resident thumbnails
    pub max_count: usize,
    /// Maximum simultaneous downloads
    pub max_concurrent_downloads: usize,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            max_total_cost: 120 * 1024 * 1024,
            max_count: 200,
            max_concurrent_downloads: 4,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests served from a resident entry
    pub hits: u64,
    /// Requests that started a new transfer
    pub misses: u64,
    /// Requests attached to a transfer already in flight
    pub coalesced: u64,
    /// Entries evicted to respect the bounds
    pub evictions: u64,
    /// Transfers aborted by `cancel`
    pub cancelled: u64,
    /// Resident entries
    pub resident: usize,
    /// Summed cost of resident entries
    pub total_cost: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} thumbnails ({} KiB), {} hits, {} misses, {} coalesced, {} evicted, {} cancelled",
            self.resident,
            self.total_cost / 1024,
            self.hits,
            self.misses,
            self.coalesced,
            self.evictions,
            self.cancelled
        )
    }
}

/// A transfer running for one key
struct InFlight {
    generation: u64,
    abort: AbortHandle,
    waiters: Vec<Waiter>,
}

struct CacheState {
    store: LruStore,
    in_flight: HashMap<CacheKey, InFlight>,
    next_generation: u64,
    stats: CacheStats,
}

struct Shared {
    state: Mutex<CacheState>,
    transport: Arc<dyn HttpTransport>,
    downloads: Semaphore,
}

/// Thread-safe thumbnail cache.
///
/// Cloning is cheap and every clone shares the same entries.
#[derive(Clone)]
pub struct ImageCache {
    shared: Arc<Shared>,
}

impl ImageCache {
    /// Create a cache that downloads through `transport`
    pub fn new(config: &ImageCacheConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let state = CacheState {
            store: LruStore::new(config.max_total_cost, config.max_count),
            in_flight: HashMap::new(),
            next_generation: 0,
            stats: CacheStats::default(),
        };

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                transport,
                downloads: Semaphore::new(config.max_concurrent_downloads.max(1)),
            }),
        }
    }

    /// Get the thumbnail of `url` downsampled to `width` x `height`.
    ///
    /// Served from memory when resident; otherwise joins the transfer already
    /// running for the same key, or starts one. Must be called within a Tokio
    /// runtime.
    pub async fn get(
        &self,
        url: &str,
        width: u32,
        height: u32,
    ) -> Result<SharedThumbnail, ImageError> {
        let key = CacheKey::new(url, width, height);

        let rx = {
            let mut state = self.shared.state.lock();

            if let Some(thumbnail) = state.store.get(&key) {
                state.stats.hits += 1;
                trace!(key = %key, "Thumbnail cache hit");
                return Ok(thumbnail);
            }

            let (tx, rx) = oneshot::channel();

            if let Some(request) = state.in_flight.get_mut(&key) {
                request.waiters.push(tx);
                state.stats.coalesced += 1;
                trace!(key = %key, "Joined in-flight transfer");
            } else {
                state.stats.misses += 1;
                state.next_generation += 1;
                let generation = state.next_generation;

                debug!(key = %key, generation, "Starting thumbnail transfer");
                let task = tokio::spawn(run_transfer(
                    Arc::clone(&self.shared),
                    key.clone(),
                    generation,
                ));

                state.in_flight.insert(
                    key,
                    InFlight {
                        generation,
                        abort: task.abort_handle(),
                        waiters: vec![tx],
                    },
                );
            }

            rx
        };

        rx.await.unwrap_or(Err(ImageError::Cancelled))
    }

    /// Get the thumbnail shown for `record` in a row `display_width` wide
    pub async fn get_for_record(
        &self,
        record: &PhotoRecord,
        display_width: u32,
    ) -> Result<SharedThumbnail, ImageError> {
        let target = scale_to_width(record.width, record.height, display_width);
        let url = record.resized_url(display_width);
        self.get(&url, target.width, target.height).await
    }

    /// Abort every transfer of `url`, whatever its target size.
    ///
    /// Waiting callers get [`ImageError::Cancelled`]. Calling it again, or
    /// after the transfer finished, does nothing.
    pub fn cancel(&self, url: &str) {
        let cancelled: Vec<InFlight> = {
            let mut state = self.shared.state.lock();
            let keys: Vec<CacheKey> = state
                .in_flight
                .keys()
                .filter(|key| key.url == url)
                .cloned()
                .collect();
            let removed: Vec<InFlight> = keys
                .iter()
                .filter_map(|key| state.in_flight.remove(key))
                .collect();
            state.stats.cancelled += removed.len() as u64;
            removed
        };

        if !cancelled.is_empty() {
            debug!(url, count = cancelled.len(), "Cancelled thumbnail transfers");
        }
        for request in cancelled {
            request.abort.abort();
        }
    }

    /// Abort every transfer in flight
    pub fn cancel_all(&self) {
        let cancelled: Vec<InFlight> = {
            let mut state = self.shared.state.lock();
            let removed: Vec<InFlight> = state.in_flight.drain().map(|(_, r)| r).collect();
            state.stats.cancelled += removed.len() as u64;
            removed
        };

        if !cancelled.is_empty() {
            debug!(count = cancelled.len(), "Cancelled all thumbnail transfers");
        }
        for request in cancelled {
            request.abort.abort();
        }
    }

    /// Drop every resident size of `url`. Returns how many entries went.
    pub fn invalidate(&self, url: &str) -> usize {
        let removed = self.shared.state.lock().store.remove_url(url);
        if removed > 0 {
            debug!(url, removed, "Invalidated thumbnails");
        }
        removed
    }

    /// Check if a thumbnail is resident (does not touch recency)
    pub fn contains(&self, url: &str, width: u32, height: u32) -> bool {
        self.shared
            .state
            .lock()
            .store
            .contains(&CacheKey::new(url, width, height))
    }

    /// Check if a transfer is running for the key
    pub fn is_loading(&self, url: &str, width: u32, height: u32) -> bool {
        self.shared
            .state
            .lock()
            .in_flight
            .contains_key(&CacheKey::new(url, width, height))
    }

    /// Number of transfers in flight
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().in_flight.len()
    }

    /// Drop every resident entry
    pub fn clear(&self) {
        self.shared.state.lock().store.clear();
        debug!("Cleared thumbnail cache");
    }

    /// Number of resident thumbnails
    pub fn len(&self) -> usize {
        self.shared.state.lock().store.len()
    }

    /// Check if no thumbnail is resident
    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().store.is_empty()
    }

    /// Summed cost of resident thumbnails
    pub fn total_cost(&self) -> usize {
        self.shared.state.lock().store.total_cost()
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        CacheStats {
            resident: state.store.len(),
            total_cost: state.store.total_cost(),
            ..state.stats.clone()
        }
    }
}

/// Body of a transfer task
async fn run_transfer(shared: Arc<Shared>, key: CacheKey, generation: u64) {
    let result = fetch_and_decode(&shared, &key).await;
    if let Err(e) = &result {
        warn!(key = %key, error = %e, "Thumbnail load failed");
    }
    complete(&shared, &key, generation, result);
}

async fn fetch_and_decode(shared: &Shared, key: &CacheKey) -> Result<SharedThumbnail, ImageError> {
    let response = {
        let _permit = shared
            .downloads
            .acquire()
            .await
            .map_err(|_| ImageError::Cancelled)?;
        shared
            .transport
            .get(&key.url)
            .await
            .map_err(|e| ImageError::Network(e.to_string()))?
    };

    if !response.is_success() {
        return Err(ImageError::Status(response.status));
    }

    let target = TargetSize {
        width: key.width,
        height: key.height,
    };
    let body = response.body;
    let image = tokio::task::spawn_blocking(move || decode_thumbnail(&body, target))
        .await
        .map_err(|e| ImageError::Decode(format!("decode task failed: {e}")))??;

    Ok(Arc::new(Thumbnail::new(image)))
}

/// Publish a finished transfer, unless it was cancelled meanwhile
fn complete(
    shared: &Shared,
    key: &CacheKey,
    generation: u64,
    result: Result<SharedThumbnail, ImageError>,
) {
    let waiters = {
        let mut state = shared.state.lock();

        let current = state
            .in_flight
            .get(key)
            .is_some_and(|request| request.generation == generation);
        if !current {
            debug!(key = %key, generation, "Discarding result of cancelled transfer");
            return;
        }

        let Some(request) = state.in_flight.remove(key) else {
            return;
        };

        if let Ok(thumbnail) = &result {
            let evicted = state.store.insert(key.clone(), Arc::clone(thumbnail));
            state.stats.evictions += evicted.len() as u64;
            for old in &evicted {
                trace!(key = %old, "Evicted thumbnail");
            }
        }

        request.waiters
    };

    for waiter in waiters {
        let _ = waiter.send(result.clone());
    }
}
