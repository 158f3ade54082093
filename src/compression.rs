//! Compression support
//!
//! The cold tier stores bytes through an injected [`Compressor`]. LZ4 is the
//! default; zstd and snappy are available for consumers that prefer ratio
//! over speed.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Compression algorithm identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    None,
    #[default]
    Lz4,
    Zstd,
    Snappy,
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionAlgorithm::None => write!(f, "none"),
            CompressionAlgorithm::Lz4 => write!(f, "lz4"),
            CompressionAlgorithm::Zstd => write!(f, "zstd"),
            CompressionAlgorithm::Snappy => write!(f, "snappy"),
        }
    }
}

// =============================================================================
// Compressor Trait
// =============================================================================

/// Lossless byte compressor used at the cold-tier boundary
pub trait Compressor: Send + Sync {
    /// Get the algorithm identifier
    fn algorithm(&self) -> CompressionAlgorithm;

    /// Compress data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Shared compressor handle
pub type CompressorRef = Arc<dyn Compressor>;

/// Default compressor for cold-tier storage
pub fn default_compressor() -> CompressorRef {
    Arc::new(Lz4Compressor::new())
}

// =============================================================================
// No-Op Compressor
// =============================================================================

/// Pass-through compressor (no compression)
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::None
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

// =============================================================================
// LZ4 Compressor
// =============================================================================

/// LZ4 compressor (fast compression)
pub struct Lz4Compressor {
    level: i32,
}

impl Lz4Compressor {
    pub fn new() -> Self {
        Self { level: 4 }
    }

    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Default for Lz4Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for Lz4Compressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(
            data,
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
            true,
        )
        .map_err(|e| Error::CompressionFailure(format!("lz4 compress: {}", e)))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::decompress(data, None)
            .map_err(|e| Error::CompressionFailure(format!("lz4 decompress: {}", e)))
    }
}

// =============================================================================
// Zstd Compressor
// =============================================================================

/// Zstd compressor (balanced compression)
pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    pub fn new() -> Self {
        Self { level: 3 }
    }

    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for ZstdCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Zstd
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(data, self.level)
            .map_err(|e| Error::CompressionFailure(format!("zstd compress: {}", e)))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(data)
            .map_err(|e| Error::CompressionFailure(format!("zstd decompress: {}", e)))
    }
}

// =============================================================================
// Snappy Compressor
// =============================================================================

/// Snappy compressor (very fast, lower ratio)
pub struct SnappyCompressor;

impl SnappyCompressor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SnappyCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for SnappyCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Snappy
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = snap::raw::Encoder::new();
        encoder
            .compress_vec(data)
            .map_err(|e| Error::CompressionFailure(format!("snappy compress: {}", e)))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = snap::raw::Decoder::new();
        decoder
            .decompress_vec(data)
            .map_err(|e| Error::CompressionFailure(format!("snappy decompress: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_DATA: &[u8] = b"Hello, this is test data that should compress well. \
        It has some repetition: Hello, this is test data that should compress well.";

    #[test]
    fn test_lz4_roundtrip() {
        let compressor = Lz4Compressor::new();

        let compressed = compressor.compress(TEST_DATA).unwrap();
        assert!(compressed.len() < TEST_DATA.len());

        let decompressed = compressor.decompress(&compressed).unwrap();
        assert_eq!(decompressed, TEST_DATA);
    }

    #[test]
    fn test_zstd_roundtrip() {
        let compressor = ZstdCompressor::new();

        let compressed = compressor.compress(TEST_DATA).unwrap();
        assert!(compressed.len() < TEST_DATA.len());

        let decompressed = compressor.decompress(&compressed).unwrap();
        assert_eq!(decompressed, TEST_DATA);
    }

    #[test]
    fn test_snappy_roundtrip() {
        let compressor = SnappyCompressor::new();

        let compressed = compressor.compress(TEST_DATA).unwrap();
        assert!(compressed.len() < TEST_DATA.len());

        let decompressed = compressor.decompress(&compressed).unwrap();
        assert_eq!(decompressed, TEST_DATA);
    }

    #[test]
    fn test_noop_roundtrip() {
        let compressor = NoopCompressor;

        let compressed = compressor.compress(TEST_DATA).unwrap();
        assert_eq!(compressed, TEST_DATA);

        let decompressed = compressor.decompress(&compressed).unwrap();
        assert_eq!(decompressed, TEST_DATA);
    }

    #[test]
    fn test_corrupt_input_is_error() {
        let compressor = Lz4Compressor::new();
        let err = compressor.decompress(b"not lz4 data").unwrap_err();
        assert!(matches!(err, Error::CompressionFailure(_)));
    }
}
