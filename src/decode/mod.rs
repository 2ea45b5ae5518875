//! Decoder seam.
//!
//! The cache treats decoding as a black box: a [`Decoder`] turns one source
//! blob into one raster of known dimensions. [`ImageDecoder`] is the default
//! implementation backed by the `image` crate.

mod raster;

use async_trait::async_trait;
use bytes::Bytes;

use crate::bitmap::Bitmap;
use crate::error::ThumbnailError;

pub use raster::{ImageDecoder, DEFAULT_MAX_DIMENSION};

/// A successfully decoded raster and its pixel dimensions.
#[derive(Debug)]
pub struct Decoded<B> {
    pub bitmap: B,
    pub width: u32,
    pub height: u32,
}

/// Converts a source blob into a decoded bitmap.
///
/// Implementations may suspend; the cache awaits them from a spawned task and
/// never holds internal locks across the call.
#[async_trait]
pub trait Decoder: Send + Sync + 'static {
    /// The bitmap type this decoder produces.
    type Bitmap: Bitmap;

    /// Decode `blob`, which was supplied for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::Decode`] when the blob is malformed or in an
    /// unsupported format.
    async fn decode(&self, key: &str, blob: Bytes)
        -> Result<Decoded<Self::Bitmap>, ThumbnailError>;
}
