//! Test utilities for integration tests.
//!
//! This module provides a controllable mock decoder and helpers for creating
//! image fixtures.

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use thumb_cache::{Bitmap, Decoded, Decoder, ThumbnailCache, ThumbnailError};

// =============================================================================
// Counting Bitmap
// =============================================================================

/// Bitmap that reports releases to a shared counter.
pub struct CountingBitmap {
    releases: Arc<AtomicUsize>,
}

impl Bitmap for CountingBitmap {
    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Gated Decoder
// =============================================================================

/// A mock decoder whose decodes block until the test opens their gate.
///
/// Each key has its own gate. `open(key)` lets exactly one pending or future
/// decode of that key finish, so tests control settlement order precisely.
/// Every decode produces a `side` x `side` raster.
pub struct GatedDecoder {
    side: u32,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    failing: Mutex<HashSet<String>>,
    started: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    releases: Arc<AtomicUsize>,
}

impl GatedDecoder {
    pub fn new(side: u32) -> Self {
        Self {
            side,
            gates: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            started: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every decode of `key` fail.
    pub fn with_failure(self, key: &str) -> Self {
        self.failing.lock().unwrap().insert(key.to_string());
        self
    }

    fn gate(&self, key: &str) -> Arc<Semaphore> {
        self.gates
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(0)))
            .clone()
    }

    /// Allow one decode of `key` to finish.
    pub fn open(&self, key: &str) {
        self.gate(key).add_permits(1);
    }

    /// Keys in the order their decodes started.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn decode_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of decodes observed running at once.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Number of bitmaps released by the cache.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Size in bytes of every entry this decoder produces.
    pub fn entry_size(&self) -> usize {
        self.side as usize * self.side as usize * 4
    }
}

#[async_trait]
impl Decoder for GatedDecoder {
    type Bitmap = CountingBitmap;

    async fn decode(&self, key: &str, _blob: Bytes) -> Result<Decoded<CountingBitmap>, ThumbnailError> {
        self.started.lock().unwrap().push(key.to_string());
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let gate = self.gate(key);
        let permit = gate
            .acquire()
            .await
            .map_err(|e| ThumbnailError::decode(key, e))?;
        permit.forget();

        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(key) {
            return Err(ThumbnailError::decode(key, "corrupt blob"));
        }

        Ok(Decoded {
            bitmap: CountingBitmap {
                releases: Arc::clone(&self.releases),
            },
            width: self.side,
            height: self.side,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Cache over a gated decoder producing 10x10 (400 byte) entries.
pub fn gated_cache(max_bytes: usize, concurrency: usize) -> ThumbnailCache<GatedDecoder> {
    ThumbnailCache::with_capacity(GatedDecoder::new(10), max_bytes, concurrency)
}

/// Placeholder blob for decoders that ignore their input.
pub fn blob() -> Bytes {
    Bytes::from_static(b"blob")
}

/// Yield to the runtime until `cond` holds.
///
/// Panics if it does not hold after many scheduler turns.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Give spawned tasks a chance to run.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Create a JPEG with a gradient pattern.
pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 85);
    encoder.encode_image(&img).expect("Failed to encode JPEG");
    buf
}
