//! End-to-end tests with the image-backed decoder.
//!
//! Tests verify:
//! - Real JPEG blobs decode into bounded RGBA thumbnails
//! - Malformed blobs surface decode errors without poisoning the cache
//! - Blobs read from disk flow through the cache

use bytes::Bytes;

use thumb_cache::{
    CacheConfig, ImageDecoder, RgbaBitmap, Settlement, ThumbnailCache, ThumbnailError,
    BYTES_PER_PIXEL,
};

use super::test_utils::create_test_jpeg;

fn image_cache(max_dimension: u32) -> ThumbnailCache<ImageDecoder> {
    let config = CacheConfig {
        max_dimension,
        ..CacheConfig::default()
    };
    ThumbnailCache::with_config(ImageDecoder::with_max_dimension(config.max_dimension), &config)
}

#[tokio::test]
async fn test_decode_jpeg_thumbnail() {
    let cache = image_cache(64);
    let blob = Bytes::from(create_test_jpeg(256, 128));

    let result: Settlement<RgbaBitmap> = cache.get("cover", blob).await;
    let entry = result.unwrap();

    assert_eq!((entry.width, entry.height), (64, 32));
    assert_eq!(entry.size, 64 * 32 * BYTES_PER_PIXEL);

    let pixels = entry.bitmap().pixels().unwrap();
    assert_eq!(pixels.len(), entry.size);
    assert_eq!(cache.stats().total_bytes, entry.size);
}

#[tokio::test]
async fn test_malformed_blob() {
    let cache = image_cache(64);

    let result = cache.get("broken", Bytes::from_static(b"not an image")).await;
    assert!(matches!(result, Err(ThumbnailError::Decode { .. })));
    assert!(!cache.has("broken"));

    // Same key with a valid blob succeeds
    let entry = cache
        .get("broken", Bytes::from(create_test_jpeg(16, 16)))
        .await
        .unwrap();
    assert_eq!((entry.width, entry.height), (16, 16));
}

#[tokio::test]
async fn test_evicted_pixels_are_released() {
    // Budget for one 32x32 thumbnail
    let config = CacheConfig {
        max_bytes: 32 * 32 * BYTES_PER_PIXEL,
        concurrency: 2,
        max_dimension: 32,
    };
    let cache = ThumbnailCache::with_config(ImageDecoder::with_max_dimension(32), &config);

    let first = cache
        .get("first", Bytes::from(create_test_jpeg(64, 64)))
        .await
        .unwrap();
    cache
        .get("second", Bytes::from(create_test_jpeg(64, 64)))
        .await
        .unwrap();

    assert!(first.bitmap().is_released());
    assert!(first.bitmap().pixels().is_none());
    assert!(!cache.has("first"));
}

#[tokio::test]
async fn test_blobs_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..4 {
        let path = dir.path().join(format!("page-{}.jpg", i));
        std::fs::write(&path, create_test_jpeg(100 + i * 10, 80)).unwrap();
    }

    let cache = image_cache(50);
    let mut handles = Vec::new();
    for i in 0..4 {
        let path = dir.path().join(format!("page-{}.jpg", i));
        let blob = Bytes::from(tokio::fs::read(&path).await.unwrap());
        handles.push(tokio::spawn(cache.get(&format!("page-{}", i), blob)));
    }

    for handle in handles {
        let entry = handle.await.unwrap().unwrap();
        assert_eq!(entry.width, 50);
        assert!(entry.height <= 50);
    }

    let stats = cache.stats();
    assert_eq!(stats.count, 4);
    assert_eq!(stats.misses, 4);
}
