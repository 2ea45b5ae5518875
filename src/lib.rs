//! # thumb-cache
//!
//! A bounded, request-coalescing LRU cache for decoded image thumbnails.
//!
//! Callers ask for a thumbnail by key and hand over the source blob. The cache
//! answers from memory when it can, merges concurrent requests for the same
//! key into one decode, and throttles decoding to a fixed number of slots,
//! serving the most recent requests first.
//!
//! ## Features
//!
//! - **Byte-budgeted LRU**: entries are sized by their decoded RGBA footprint
//!   and the least recently used ones are evicted to stay within budget
//! - **Request coalescing**: N concurrent requests for one key cost one decode
//! - **Throttled LIFO admission**: at most `concurrency` decodes run at once,
//!   newest requests first
//! - **Explicit release**: bitmaps holding external resources are released on
//!   eviction, invalidation, and clear
//!
//! ## Architecture
//!
//! - [`cache`] - The cache, its LRU store, and the admission queue
//! - [`decode`] - The decoder seam and the `image`-backed default decoder
//! - [`bitmap`] - Decoded raster handles with explicit release
//! - [`config`] - Cache settings and CLI arguments
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use thumb_cache::{CacheConfig, ImageDecoder, ThumbnailCache};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = CacheConfig::default();
//!     let decoder = ImageDecoder::with_max_dimension(config.max_dimension);
//!     let cache = ThumbnailCache::with_config(decoder, &config);
//!
//!     let blob = Bytes::from(std::fs::read("page-001.jpg").unwrap());
//!     let entry = cache.get("page-001", blob).await.unwrap();
//!
//!     println!("{}x{}, {:.1}% of budget used", entry.width, entry.height,
//!         cache.stats().utilization);
//! }
//! ```

pub mod bitmap;
pub mod cache;
pub mod config;
pub mod decode;
pub mod error;

// Re-export commonly used types
pub use bitmap::{Bitmap, RgbaBitmap, BYTES_PER_PIXEL};
pub use cache::{
    CacheEntry, CacheStats, Settlement, ThumbnailCache, DEFAULT_CONCURRENCY, DEFAULT_MAX_BYTES,
};
pub use config::{parse_size, CacheConfig, Config};
pub use decode::{Decoded, Decoder, ImageDecoder, DEFAULT_MAX_DIMENSION};
pub use error::ThumbnailError;
