//! Recency-ordered store for decoded thumbnails.
//!
//! The store tracks the total decoded size of its entries in bytes and evicts
//! least-recently-used entries when an insert would exceed the budget.
//!
//! # Size-Based Eviction
//!
//! The budget is soft: an entry larger than the whole budget is still stored
//! after everything else has been evicted.
//!
//! The store never releases bitmaps itself. Every method that removes entries
//! hands them back so the owner can release them.

use std::sync::Arc;

use lru::LruCache;

use crate::bitmap::{Bitmap, BYTES_PER_PIXEL};

// =============================================================================
// Cache Entry
// =============================================================================

/// One decoded raster plus the metadata used for budget accounting.
///
/// The bitmap stays owned by the cache while the entry is stored; holders of
/// the entry may read it but must not release it.
#[derive(Debug)]
pub struct CacheEntry<B> {
    bitmap: B,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Decoded footprint in bytes (`width * height * 4`)
    pub size: usize,
}

impl<B> CacheEntry<B> {
    /// Create an entry, computing its RGBA footprint from the dimensions.
    pub fn new(bitmap: B, width: u32, height: u32) -> Self {
        Self {
            bitmap,
            width,
            height,
            size: width as usize * height as usize * BYTES_PER_PIXEL,
        }
    }

    /// The decoded image handle.
    pub fn bitmap(&self) -> &B {
        &self.bitmap
    }
}

impl<B: Bitmap> CacheEntry<B> {
    /// Free the bitmap's resources once the entry has left the store.
    pub(crate) fn release(&self) {
        self.bitmap.release();
    }
}

// =============================================================================
// Entry Store
// =============================================================================

/// LRU map from key to entry with a byte budget.
pub(crate) struct EntryStore<B> {
    entries: LruCache<String, Arc<CacheEntry<B>>>,
    max_bytes: usize,
    total_bytes: usize,
}

impl<B: Bitmap> EntryStore<B> {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            max_bytes,
            total_bytes: 0,
        }
    }

    /// Look up an entry and mark it most recently used.
    pub fn touch(&mut self, key: &str) -> Option<Arc<CacheEntry<B>>> {
        self.entries.get(key).cloned()
    }

    /// Membership check that leaves recency untouched.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Insert an entry as most recently used.
    ///
    /// Least-recently-used entries are evicted first until the new entry fits
    /// or the store is empty. A previous entry under the same key is replaced.
    /// Returns every entry that left the store.
    pub fn insert(&mut self, key: String, entry: Arc<CacheEntry<B>>) -> Vec<Arc<CacheEntry<B>>> {
        let mut removed = Vec::new();

        if let Some(old) = self.entries.pop(&key) {
            self.total_bytes = self.total_bytes.saturating_sub(old.size);
            removed.push(old);
        }

        while self.total_bytes + entry.size > self.max_bytes {
            match self.entries.pop_lru() {
                Some((_, evicted)) => {
                    self.total_bytes = self.total_bytes.saturating_sub(evicted.size);
                    removed.push(evicted);
                }
                None => break,
            }
        }

        self.total_bytes += entry.size;
        self.entries.put(key, entry);

        removed
    }

    /// Remove an entry, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<Arc<CacheEntry<B>>> {
        let entry = self.entries.pop(key)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.size);
        Some(entry)
    }

    /// Remove every entry, returning them in least-recently-used order.
    pub fn drain(&mut self) -> Vec<Arc<CacheEntry<B>>> {
        let mut drained = Vec::with_capacity(self.entries.len());
        while let Some((_, entry)) = self.entries.pop_lru() {
            drained.push(entry);
        }
        self.total_bytes = 0;
        drained
    }

    /// Keys from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.entries.iter().rev().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

// =============================================================================
// Tests
// =============================================================================
