use thiserror::Error;

/// Errors surfaced by the thumbnail cache and its decoders.
///
/// The type is `Clone` because a single decode failure is delivered to every
/// caller coalesced onto the same request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThumbnailError {
    /// The source blob could not be decoded into a raster image
    #[error("Failed to decode thumbnail '{key}': {message}")]
    Decode { key: String, message: String },

    /// Keys must be non-empty
    #[error("Invalid key: thumbnail keys must be non-empty")]
    InvalidKey,

    /// The request was detached by `invalidate` before it settled
    #[error("Request for thumbnail '{key}' was invalidated before it completed")]
    Invalidated { key: String },

    /// Reading a source blob failed
    #[error("I/O error: {0}")]
    Io(String),
}

impl ThumbnailError {
    /// Build a decode error for `key` from any displayable cause.
    pub fn decode(key: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        ThumbnailError::Decode {
            key: key.into(),
            message: cause.to_string(),
        }
    }
}

impl From<std::io::Error> for ThumbnailError {
    fn from(err: std::io::Error) -> Self {
        ThumbnailError::Io(err.to_string())
    }
}
