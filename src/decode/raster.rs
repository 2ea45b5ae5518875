//! Image-crate backed decoder.
//!
//! Source blobs are decoded with format sniffing, downsampled to fit within a
//! square bounding box, and converted to RGBA8.
//!
//! # Design Decisions
//!
//! - **Off-runtime decoding**: decoding is CPU bound, so it runs on tokio's
//!   blocking pool rather than on an async worker thread.
//!
//! - **Downscale only**: images already within the bounding box keep their
//!   native size.

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageReader};
use tracing::debug;

use super::{Decoded, Decoder};
use crate::bitmap::RgbaBitmap;
use crate::error::ThumbnailError;

/// Default bounding box edge for decoded thumbnails, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 256;

// =============================================================================
// Image Decoder
// =============================================================================

/// Decodes JPEG and PNG blobs into RGBA thumbnails.
///
/// # Example
///
/// ```ignore
/// use thumb_cache::decode::{Decoder, ImageDecoder};
///
/// let decoder = ImageDecoder::with_max_dimension(128);
/// let decoded = decoder.decode("cover.jpg", blob).await?;
/// assert!(decoded.width <= 128 && decoded.height <= 128);
/// ```
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    max_dimension: u32,
}

impl ImageDecoder {
    /// Create a decoder using [`DEFAULT_MAX_DIMENSION`].
    pub fn new() -> Self {
        Self::with_max_dimension(DEFAULT_MAX_DIMENSION)
    }

    /// Create a decoder whose output fits within `max_dimension` on both axes.
    ///
    /// A zero bound is treated as 1.
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    /// The bounding box edge in pixels.
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Decode synchronously on the current thread.
    pub fn decode_blocking(
        &self,
        key: &str,
        blob: &[u8],
    ) -> Result<Decoded<RgbaBitmap>, ThumbnailError> {
        let reader = ImageReader::new(Cursor::new(blob))
            .with_guessed_format()
            .map_err(|e| ThumbnailError::decode(key, e))?;

        let img = reader.decode().map_err(|e| ThumbnailError::decode(key, e))?;
        let img = fit_within(img, self.max_dimension);

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        debug!(key, width, height, "decoded thumbnail");

        Ok(Decoded {
            bitmap: RgbaBitmap::new(rgba.into_raw()),
            width,
            height,
        })
    }
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Decoder for ImageDecoder {
    type Bitmap = RgbaBitmap;

    async fn decode(&self, key: &str, blob: Bytes) -> Result<Decoded<RgbaBitmap>, ThumbnailError> {
        let decoder = self.clone();
        let owned_key = key.to_string();

        tokio::task::spawn_blocking(move || decoder.decode_blocking(&owned_key, &blob))
            .await
            .map_err(|e| ThumbnailError::decode(key, e))?
    }
}

/// Downscale `img` to fit within a `max` x `max` box, preserving aspect ratio.
fn fit_within(img: DynamicImage, max: u32) -> DynamicImage {
    if img.width() <= max && img.height() <= max {
        img
    } else {
        img.thumbnail(max, max)
    }
}

// =============================================================================
// Tests
// =============================================================================
