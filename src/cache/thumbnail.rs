//! Request-coalescing thumbnail cache with throttled decode admission.
//!
//! All bookkeeping (store, pending map, admission queue, active count) lives
//! behind one mutex that is never held across an `.await`. A key therefore
//! moves from "pending" to "stored" in a single critical section, and no
//! caller can observe it in neither place while its decode is settling.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::queue::{AdmissionQueue, QueuedRequest};
use super::store::{CacheEntry, EntryStore};
use super::Settlement;
use crate::bitmap::Bitmap;
use crate::config::CacheConfig;
use crate::decode::{Decoded, Decoder};
use crate::error::ThumbnailError;

/// Default byte budget: 64MB of decoded RGBA pixels.
pub const DEFAULT_MAX_BYTES: usize = 64 * 1024 * 1024;

/// Default number of decodes allowed to run at once.
pub const DEFAULT_CONCURRENCY: usize = 6;

// =============================================================================
// Stats
// =============================================================================

/// Snapshot of cache state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of stored entries
    pub count: usize,

    /// Sum of stored entry sizes in bytes
    pub total_bytes: usize,

    /// Byte budget
    pub max_bytes: usize,

    /// `total_bytes / max_bytes` as a percentage
    pub utilization: f64,

    /// Requests waiting for a decode slot
    pub queued: usize,

    /// Decodes currently running
    pub active: usize,

    /// `get` calls answered from the store
    pub hits: u64,

    /// `get` calls that started a new decode
    pub misses: u64,

    /// `get` calls that joined a decode already queued or running
    pub coalesced: u64,

    /// Entries removed to make room for new ones
    pub evictions: u64,
}

// =============================================================================
// Internal State
// =============================================================================

type Completion<B> = watch::Receiver<Option<Settlement<B>>>;

/// An outstanding decode, keyed in the pending map.
struct PendingDecode<B> {
    generation: u64,
    done: Completion<B>,
}

struct State<B> {
    store: EntryStore<B>,
    pending: HashMap<String, PendingDecode<B>>,
    queue: AdmissionQueue<B>,
    active: usize,
    next_generation: u64,
    hits: u64,
    misses: u64,
    coalesced: u64,
    evictions: u64,
}

struct Shared<D: Decoder> {
    decoder: D,
    concurrency: usize,
    state: Mutex<State<D::Bitmap>>,
}

/// Outcome of the synchronous admission step of `get`.
enum Admission<B> {
    Ready(Settlement<B>),
    Waiting { key: String, done: Completion<B> },
}

// =============================================================================
// Thumbnail Cache
// =============================================================================

/// Bounded LRU cache of decoded thumbnails.
///
/// Cloning the cache is cheap and yields another handle to the same state.
///
/// # Guarantees
///
/// - At most one decode per key is queued or running at a time; concurrent
///   `get` calls for the same key share its result.
/// - At most `concurrency` decodes run at once. Waiting requests are started
///   most-recent-first.
/// - After every operation the stored bytes fit within the budget, unless a
///   single entry is larger than the whole budget.
/// - Every stored bitmap is released exactly once when it leaves the store.
///
/// # Example
///
/// ```ignore
/// use thumb_cache::{ImageDecoder, ThumbnailCache};
///
/// let cache = ThumbnailCache::new(ImageDecoder::new());
///
/// let entry = cache.get("volume-1", blob).await?;
/// assert!(cache.has("volume-1"));
///
/// cache.invalidate("volume-1");
/// assert!(cache.get_sync("volume-1").is_none());
/// ```
pub struct ThumbnailCache<D: Decoder> {
    shared: Arc<Shared<D>>,
}

impl<D: Decoder> Clone for ThumbnailCache<D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D: Decoder> ThumbnailCache<D> {
    /// Create a cache with the default budget and concurrency.
    pub fn new(decoder: D) -> Self {
        Self::with_capacity(decoder, DEFAULT_MAX_BYTES, DEFAULT_CONCURRENCY)
    }

    /// Create a cache from a [`CacheConfig`].
    pub fn with_config(decoder: D, config: &CacheConfig) -> Self {
        Self::with_capacity(decoder, config.max_bytes, config.concurrency)
    }

    /// Create a cache with an explicit byte budget and decode concurrency.
    ///
    /// # Arguments
    ///
    /// * `max_bytes` - Maximum total decoded size of stored entries
    /// * `concurrency` - Maximum simultaneous decodes (a zero value is treated as 1)
    pub fn with_capacity(decoder: D, max_bytes: usize, concurrency: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                decoder,
                concurrency: concurrency.max(1),
                state: Mutex::new(State {
                    store: EntryStore::new(max_bytes),
                    pending: HashMap::new(),
                    queue: AdmissionQueue::new(),
                    active: 0,
                    next_generation: 0,
                    hits: 0,
                    misses: 0,
                    coalesced: 0,
                    evictions: 0,
                }),
            }),
        }
    }

    /// Get the thumbnail for `key`, decoding `blob` if it is not cached.
    ///
    /// Admission happens when this method is called, not when the returned
    /// future is first polled, so call order determines queue order.
    ///
    /// - A stored entry is returned immediately and marked most recently used.
    /// - If a decode for `key` is already queued or running, the future
    ///   resolves to that decode's result.
    /// - Otherwise a new request is queued and started once a slot is free.
    ///
    /// # Errors
    ///
    /// - [`ThumbnailError::InvalidKey`] if `key` is empty
    /// - [`ThumbnailError::Decode`] if the decoder rejects the blob; every
    ///   coalesced caller receives it and a later call retries
    /// - [`ThumbnailError::Invalidated`] if the key was invalidated before the
    ///   request settled
    ///
    /// # Panics
    ///
    /// Panics if a decode must be started and this is called outside a Tokio
    /// runtime.
    pub fn get(
        &self,
        key: &str,
        blob: Bytes,
    ) -> impl Future<Output = Settlement<D::Bitmap>> + Send + 'static {
        let admission = self.shared.admit(key, blob);

        async move {
            match admission {
                Admission::Ready(settlement) => settlement,
                Admission::Waiting { key, mut done } => {
                    let settled = match done.wait_for(Option::is_some).await {
                        Ok(value) => value.clone(),
                        Err(_) => None,
                    };
                    settled.unwrap_or(Err(ThumbnailError::Invalidated { key }))
                }
            }
        }
    }

    /// Look up a stored entry without decoding.
    ///
    /// A hit marks the entry most recently used.
    pub fn get_sync(&self, key: &str) -> Option<Arc<CacheEntry<D::Bitmap>>> {
        self.shared.lock().store.touch(key)
    }

    /// Whether `key` is stored. Pending and queued requests are not counted
    /// and recency is not updated.
    pub fn has(&self, key: &str) -> bool {
        self.shared.lock().store.contains(key)
    }

    /// Drop everything known about `key`.
    ///
    /// A stored entry is released and removed. A queued request is discarded
    /// and its waiters receive [`ThumbnailError::Invalidated`]. A running
    /// decode is detached: it still completes, but its result is released
    /// instead of stored and its waiters receive `Invalidated`. The next `get`
    /// for `key` starts a fresh decode.
    pub fn invalidate(&self, key: &str) {
        let (removed, dropped) = {
            let mut state = self.shared.lock();
            let removed = state.store.remove(key);
            state.pending.remove(key);
            let dropped = state.queue.remove(key);
            (removed, dropped)
        };

        if let Some(entry) = removed {
            debug!(key, size = entry.size, "invalidated thumbnail");
            entry.release();
        }

        // Dropping the sender closes the channel and wakes the waiters
        drop(dropped);
    }

    /// Release and remove every stored entry.
    ///
    /// Queued and running decodes are unaffected and store their results
    /// when they settle.
    pub fn clear(&self) {
        let drained = self.shared.lock().store.drain();
        debug!(count = drained.len(), "cleared thumbnail cache");

        for entry in drained {
            entry.release();
        }
    }

    /// Snapshot of the current cache state.
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.lock();
        let total_bytes = state.store.total_bytes();
        let max_bytes = state.store.max_bytes();
        let utilization = if max_bytes == 0 {
            0.0
        } else {
            total_bytes as f64 / max_bytes as f64 * 100.0
        };

        CacheStats {
            count: state.store.len(),
            total_bytes,
            max_bytes,
            utilization,
            queued: state.queue.len(),
            active: state.active,
            hits: state.hits,
            misses: state.misses,
            coalesced: state.coalesced,
            evictions: state.evictions,
        }
    }

    /// Stored keys from least to most recently used.
    pub fn keys(&self) -> Vec<String> {
        self.shared.lock().store.keys_by_recency()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.shared.lock().store.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The byte budget.
    pub fn capacity(&self) -> usize {
        self.shared.lock().store.max_bytes()
    }

    /// Maximum number of simultaneous decodes.
    pub fn concurrency(&self) -> usize {
        self.shared.concurrency
    }

    /// The decoder used for cache misses.
    pub fn decoder(&self) -> &D {
        &self.shared.decoder
    }
}

// =============================================================================
// Scheduling
// =============================================================================

impl<D: Decoder> Shared<D> {
    fn lock(&self) -> MutexGuard<'_, State<D::Bitmap>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide how a `get` call is served. Runs entirely under the lock.
    fn admit(self: &Arc<Self>, key: &str, blob: Bytes) -> Admission<D::Bitmap> {
        if key.is_empty() {
            return Admission::Ready(Err(ThumbnailError::InvalidKey));
        }

        let mut state = self.lock();

        if let Some(entry) = state.store.touch(key) {
            state.hits += 1;
            return Admission::Ready(Ok(entry));
        }

        let key = key.to_string();
        if let Some(done) = state.pending.get(&key).map(|p| p.done.clone()) {
            state.coalesced += 1;
            return Admission::Waiting { key, done };
        }

        state.misses += 1;
        let generation = state.next_generation;
        state.next_generation += 1;

        let (sender, done) = watch::channel(None);
        state.pending.insert(
            key.clone(),
            PendingDecode {
                generation,
                done: done.clone(),
            },
        );
        state.queue.push(QueuedRequest {
            key: key.clone(),
            blob,
            generation,
            done: sender,
        });
        debug!(key = %key, queued = state.queue.len(), "queued thumbnail decode");

        self.drain(&mut state);

        Admission::Waiting { key, done }
    }

    /// Start queued requests, newest first, until the queue is empty or every
    /// slot is busy.
    fn drain(self: &Arc<Self>, state: &mut State<D::Bitmap>) {
        while state.active < self.concurrency {
            let Some(request) = state.queue.pop_latest() else {
                break;
            };
            state.active += 1;

            let shared = Arc::clone(self);
            tokio::spawn(async move { shared.run(request).await });
        }
    }

    async fn run(self: Arc<Self>, request: QueuedRequest<D::Bitmap>) {
        let QueuedRequest {
            key,
            blob,
            generation,
            done,
        } = request;

        debug!(key = %key, "starting thumbnail decode");

        // Decode in its own task so a panicking decoder still settles
        let decoding = {
            let shared = Arc::clone(&self);
            let key = key.clone();
            tokio::spawn(async move { shared.decoder.decode(&key, blob).await })
        };
        let result = match decoding.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(ThumbnailError::decode(&key, "decoder panicked")),
            Err(e) => Err(ThumbnailError::decode(&key, e)),
        };
        let settlement = self.settle(&key, generation, result);

        done.send_replace(Some(settlement));
    }

    /// Record a finished decode: free its slot, store a successful result if
    /// the request is still current, and promote queued requests.
    fn settle(
        self: &Arc<Self>,
        key: &str,
        generation: u64,
        result: Result<Decoded<D::Bitmap>, ThumbnailError>,
    ) -> Settlement<D::Bitmap> {
        let mut released = Vec::new();

        let settlement = {
            let mut state = self.lock();
            state.active -= 1;

            let current = state
                .pending
                .get(key)
                .is_some_and(|p| p.generation == generation);
            if current {
                state.pending.remove(key);
            }

            let settlement = match result {
                Ok(Decoded {
                    bitmap,
                    width,
                    height,
                }) => {
                    let entry = Arc::new(CacheEntry::new(bitmap, width, height));
                    if current {
                        let evicted = state.store.insert(key.to_string(), Arc::clone(&entry));
                        state.evictions += evicted.len() as u64;
                        if !evicted.is_empty() {
                            debug!(
                                key,
                                evicted = evicted.len(),
                                total_bytes = state.store.total_bytes(),
                                "evicted thumbnails to fit budget"
                            );
                        }
                        released.extend(evicted);
                        Ok(entry)
                    } else {
                        debug!(key, "discarding decode for invalidated thumbnail");
                        released.push(entry);
                        Err(ThumbnailError::Invalidated {
                            key: key.to_string(),
                        })
                    }
                }
                Err(err) => {
                    warn!(key, error = %err, "thumbnail decode failed");
                    Err(err)
                }
            };

            self.drain(&mut state);
            settlement
        };

        for entry in released {
            entry.release();
        }

        settlement
    }
}

impl<D: Decoder> Drop for Shared<D> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for entry in state.store.drain() {
            entry.release();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
