//! Configuration management for thumb-cache.
//!
//! This module provides:
//! - [`CacheConfig`]: library-level settings for a [`ThumbnailCache`](crate::ThumbnailCache)
//! - [`Config`]: command-line arguments via clap, with environment variables
//!   using the `THUMB_` prefix
//!
//! # Environment Variables
//!
//! - `THUMB_MAX_BYTES` - Decoded byte budget, e.g. `64MB` (default: 64MB)
//! - `THUMB_CONCURRENCY` - Maximum simultaneous decodes (default: 6)
//! - `THUMB_MAX_DIMENSION` - Thumbnail bounding box edge in pixels (default: 256)
//! - `THUMB_PASSES` - Number of sweeps over the input directory (default: 2)

use std::path::PathBuf;

use clap::Parser;

use crate::cache::{DEFAULT_CONCURRENCY, DEFAULT_MAX_BYTES};
use crate::decode::DEFAULT_MAX_DIMENSION;

/// Default number of sweeps over the input directory.
pub const DEFAULT_PASSES: usize = 2;

/// Upper bound for decode concurrency.
pub const MAX_CONCURRENCY: usize = 256;

// =============================================================================
// Cache Configuration
// =============================================================================

/// Settings for constructing a thumbnail cache and its decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Byte budget for decoded entries
    pub max_bytes: usize,

    /// Maximum number of simultaneous decodes
    pub concurrency: usize,

    /// Thumbnail bounding box edge in pixels
    pub max_dimension: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            concurrency: DEFAULT_CONCURRENCY,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl CacheConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_bytes == 0 {
            return Err("max_bytes must be greater than 0".to_string());
        }

        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(format!(
                "concurrency must be between 1 and {}",
                MAX_CONCURRENCY
            ));
        }

        if self.max_dimension == 0 {
            return Err("max_dimension must be greater than 0".to_string());
        }

        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// thumb-cache - decode a directory of images through a bounded thumbnail cache.
///
/// Every file in the directory is requested concurrently, the whole directory
/// is swept `--passes` times, and the final cache statistics are printed.
#[derive(Parser, Debug, Clone)]
#[command(name = "thumb-cache")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Directory containing source images.
    pub input: PathBuf,

    /// Decoded byte budget (e.g. "64MB", "512KB", or plain bytes).
    #[arg(long, default_value = "64MB", env = "THUMB_MAX_BYTES", value_parser = parse_size)]
    pub max_bytes: usize,

    /// Maximum number of simultaneous decodes.
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY, env = "THUMB_CONCURRENCY")]
    pub concurrency: usize,

    /// Thumbnail bounding box edge in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_DIMENSION, env = "THUMB_MAX_DIMENSION")]
    pub max_dimension: u32,

    /// Number of sweeps over the input directory.
    #[arg(long, default_value_t = DEFAULT_PASSES, env = "THUMB_PASSES")]
    pub passes: usize,

    /// Print statistics as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// The cache settings carried by these arguments.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_bytes: self.max_bytes,
            concurrency: self.concurrency,
            max_dimension: self.max_dimension,
        }
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.cache_config().validate()?;

        if self.passes == 0 {
            return Err("passes must be greater than 0".to_string());
        }

        if !self.input.is_dir() {
            return Err(format!(
                "input '{}' is not a directory",
                self.input.display()
            ));
        }

        Ok(())
    }
}

/// Parse a human-readable byte size such as `64MB`, `512KB`, `1GB`, or `1024`.
///
/// Units are binary (1KB = 1024 bytes) and case-insensitive.
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let upper = s.to_ascii_uppercase();

    let (digits, multiplier) = if let Some(n) = upper.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = upper.strip_suffix('B') {
        (n, 1)
    } else {
        (upper.as_str(), 1)
    };

    let value: usize = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid size: '{}'", s))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: '{}'", s))
}

// =============================================================================
// Tests
// =============================================================================
