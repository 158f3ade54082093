//! Error types for the caching engine
//!
//! Cache misses are never errors; they are absent values. The variants here
//! cover bad input, resource limits, and failures of the injected
//! collaborators (loader, compressor).

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the caching engine
#[derive(Error, Debug)]
pub enum Error {
    /// A key-deletion pattern failed to compile
    #[error("invalid key pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Rejected input (empty key, zero TTL, and similar)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The warming queue cannot accept more work
    #[error("warming queue full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    /// The injected loader failed or returned nothing usable
    #[error("loader failed for key {key}: {reason}")]
    LoaderFailure { key: String, reason: String },

    /// Compression or decompression at the cold tier failed
    #[error("compression failure: {0}")]
    CompressionFailure(String),

    /// A background task exceeded its allotted time
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors that are counted and swallowed rather than surfaced to callers.
    ///
    /// Loader and compressor failures degrade to a miss; input errors are
    /// returned to the caller unchanged.
    pub fn is_swallowed(&self) -> bool {
        matches!(
            self,
            Error::LoaderFailure { .. } | Error::CompressionFailure(_) | Error::Timeout(_)
        )
    }
}

/// Result type alias for the caching engine
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swallowed_classification() {
        let loader = Error::LoaderFailure {
            key: "k".into(),
            reason: "timeout".into(),
        };
        assert!(loader.is_swallowed());

        let input = Error::InvalidInput("empty key".into());
        assert!(!input.is_swallowed());
    }

    #[test]
    fn test_pattern_error_from_regex() {
        let err = regex::Regex::new("[unclosed").unwrap_err();
        let err: Error = err.into();
        assert!(matches!(err, Error::InvalidPattern(_)));
        assert!(!err.is_swallowed());
    }
}
