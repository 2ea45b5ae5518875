//! Thumbnail cache.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ThumbnailCache                       │
//! │                                                          │
//! │   get(key, blob)                                         │
//! │      │                                                   │
//! │      ├─▶ EntryStore ─── hit ──────────────▶ entry        │
//! │      │   (LRU, byte budget)                              │
//! │      │                                                   │
//! │      ├─▶ pending map ── in flight ─▶ join same result    │
//! │      │                                                   │
//! │      └─▶ AdmissionQueue (LIFO)                           │
//! │              │  up to `concurrency` at once              │
//! │              ▼                                           │
//! │           Decoder ──▶ insert + evict ──▶ wake waiters    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`ThumbnailCache`]: Public entry point; owns the store, pending map, and queue
//! - [`CacheEntry`]: Decoded bitmap with dimensions and byte footprint
//! - [`CacheStats`]: Point-in-time snapshot for observability
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use thumb_cache::{ImageDecoder, ThumbnailCache};
//!
//! #[tokio::main]
//! async fn main() {
//!     // 32MB budget, 6 concurrent decodes
//!     let cache = ThumbnailCache::with_capacity(ImageDecoder::new(), 32 * 1024 * 1024, 6);
//!
//!     let blob = Bytes::from(std::fs::read("cover.jpg").unwrap());
//!     match cache.get("volume-42", blob).await {
//!         Ok(entry) => println!("{}x{} ({} bytes)", entry.width, entry.height, entry.size),
//!         Err(e) => eprintln!("no thumbnail: {}", e),
//!     }
//! }
//! ```

mod queue;
mod store;
mod thumbnail;

use std::sync::Arc;

use crate::error::ThumbnailError;

pub use store::CacheEntry;
pub use thumbnail::{CacheStats, ThumbnailCache, DEFAULT_CONCURRENCY, DEFAULT_MAX_BYTES};

/// Final outcome of a `get` call, shared by every caller coalesced onto the
/// same decode.
pub type Settlement<B> = Result<Arc<CacheEntry<B>>, ThumbnailError>;
