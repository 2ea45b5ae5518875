//! thumb-cache - decode a directory of images through the thumbnail cache.
//!
//! Useful for sizing the byte budget and concurrency for a catalog: every
//! image is requested concurrently, the directory is swept several times, and
//! the resulting hit/miss/eviction statistics are printed.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use bytes::Bytes;
use clap::Parser;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use thumb_cache::{CacheStats, Config, ImageDecoder, ThumbnailCache, ThumbnailError};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let files = match list_files(&config.input).await {
        Ok(files) => files,
        Err(e) => {
            error!("Failed to read {}: {}", config.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Input: {} ({} files)", config.input.display(), files.len());
    info!(
        "  Cache: {}MB budget, {} decode slots, {}px thumbnails",
        config.max_bytes / (1024 * 1024),
        config.concurrency,
        config.max_dimension
    );

    let cache_config = config.cache_config();
    let decoder = ImageDecoder::with_max_dimension(cache_config.max_dimension);
    let cache = ThumbnailCache::with_config(decoder, &cache_config);

    for pass in 1..=config.passes {
        let start = Instant::now();
        let (ok, failed) = run_pass(&cache, &files).await;
        info!(
            "Pass {}: {} decoded, {} failed in {:?}",
            pass,
            ok,
            failed,
            start.elapsed()
        );
    }

    print_stats(&cache.stats(), config.json);

    ExitCode::SUCCESS
}

/// Request every file through the cache at once.
///
/// Returns `(succeeded, failed)`.
async fn run_pass(cache: &ThumbnailCache<ImageDecoder>, files: &[PathBuf]) -> (usize, usize) {
    let mut tasks = JoinSet::new();

    for path in files {
        let cache = cache.clone();
        let path = path.clone();
        let key = path.to_string_lossy().into_owned();

        tasks.spawn(async move {
            let blob = tokio::fs::read(&path).await.map_err(ThumbnailError::from)?;
            cache.get(&key, Bytes::from(blob)).await.map(|_| ())
        });
    }

    let mut ok = 0;
    let mut failed = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => ok += 1,
            Ok(Err(e)) => {
                warn!("{}", e);
                failed += 1;
            }
            Err(e) => {
                error!("Request task failed: {}", e);
                failed += 1;
            }
        }
    }

    (ok, failed)
}

/// Regular files directly inside `dir`, sorted by name.
async fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

fn print_stats(stats: &CacheStats, json: bool) {
    if json {
        match serde_json::to_string_pretty(stats) {
            Ok(out) => println!("{}", out),
            Err(e) => error!("Failed to serialize stats: {}", e),
        }
        return;
    }

    println!("entries:     {}", stats.count);
    println!(
        "bytes:       {} / {} ({:.1}%)",
        stats.total_bytes, stats.max_bytes, stats.utilization
    );
    println!(
        "requests:    {} hits, {} misses, {} coalesced",
        stats.hits, stats.misses, stats.coalesced
    );
    println!("evictions:   {}", stats.evictions);
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "thumb_cache=debug"
    } else {
        "thumb_cache=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
