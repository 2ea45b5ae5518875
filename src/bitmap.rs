//! Decoded raster handles.
//!
//! A bitmap may hold resources outside the Rust heap (GPU textures, pooled
//! buffers). The cache owns every bitmap it stores and calls
//! [`Bitmap::release`] exactly once when the entry leaves the store, whether
//! through eviction, invalidation, or a full clear.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;

/// Bytes per pixel for RGBA rasters.
pub const BYTES_PER_PIXEL: usize = 4;

/// A decoded image handle owned by the cache.
pub trait Bitmap: Send + Sync + 'static {
    /// Free the resources backing this bitmap.
    ///
    /// Called by the cache once per stored bitmap. Implementations must
    /// tolerate repeated calls.
    fn release(&self);
}

// =============================================================================
// RGBA Bitmap
// =============================================================================

/// CPU-resident RGBA8 raster.
///
/// Pixel data is dropped on [`release`](Bitmap::release); afterwards
/// [`pixels`](RgbaBitmap::pixels) returns `None`.
#[derive(Debug)]
pub struct RgbaBitmap {
    pixels: Mutex<Option<Bytes>>,
    released: AtomicBool,
}

impl RgbaBitmap {
    /// Wrap an RGBA8 pixel buffer.
    pub fn new(pixels: impl Into<Bytes>) -> Self {
        Self {
            pixels: Mutex::new(Some(pixels.into())),
            released: AtomicBool::new(false),
        }
    }

    /// The pixel buffer, or `None` once released.
    pub fn pixels(&self) -> Option<Bytes> {
        self.pixels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether [`release`](Bitmap::release) has been called.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Bitmap for RgbaBitmap {
    fn release(&self) {
        self.released.store(true, Ordering::Release);
        self.pixels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
