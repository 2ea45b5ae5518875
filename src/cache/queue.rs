//! Admission queue for decode requests that have not yet been granted a slot.
//!
//! Requests are served last-in-first-out: while a user scrolls quickly, the
//! newest requests correspond to what is on screen now, and older ones to
//! content that has already scrolled away.

use bytes::Bytes;
use tokio::sync::watch;

use super::Settlement;

/// A request admitted to the queue but not yet started.
pub(crate) struct QueuedRequest<B> {
    /// Cache key
    pub key: String,

    /// Source blob to decode
    pub blob: Bytes,

    /// Identifies this request in the pending map
    pub generation: u64,

    /// Completion handle shared with every coalesced caller
    pub done: watch::Sender<Option<Settlement<B>>>,
}

/// LIFO stack of queued requests.
pub(crate) struct AdmissionQueue<B> {
    items: Vec<QueuedRequest<B>>,
}

impl<B> AdmissionQueue<B> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, request: QueuedRequest<B>) {
        self.items.push(request);
    }

    /// Take the most recently queued request.
    pub fn pop_latest(&mut self) -> Option<QueuedRequest<B>> {
        self.items.pop()
    }

    /// Remove the queued request for `key`, if any.
    ///
    /// Dropping the returned request drops its completion sender, which wakes
    /// its waiters with a closed channel.
    pub fn remove(&mut self, key: &str) -> Option<QueuedRequest<B>> {
        let idx = self.items.iter().position(|r| r.key == key)?;
        Some(self.items.remove(idx))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
