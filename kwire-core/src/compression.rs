//! Compression configuration types.
//!
//! This module provides:
//! - [`CompressionCodec`]: codec ids as carried on the wire
//! - [`CompressionLevel`]: compression quality settings
//! - [`CompressionConfig`]: when and how hard to compress

use crate::codec::BoxedCodec;
use crate::error::DecodingError;

#[cfg(feature = "compression-gzip")]
use crate::codec::GzipCodec;

#[cfg(feature = "compression-zstd")]
use crate::codec::ZstdCodec;

/// Compression codecs with a built-in implementation.
///
/// The wire assigns ids 0 (none), 1 (gzip), 2 (snappy), 3 (lz4) and
/// 4 (zstd). Only codecs compiled in via features have a variant here;
/// [`CompressionCodec::from_id`] returns `None` for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionCodec {
    #[default]
    Uncompressed,
    #[cfg(feature = "compression-gzip")]
    Gzip,
    #[cfg(feature = "compression-zstd")]
    Zstd,
}

impl CompressionCodec {
    /// Parse a wire codec id.
    pub fn from_id(id: i8) -> Option<Self> {
        match id {
            0 => Some(Self::Uncompressed),
            #[cfg(feature = "compression-gzip")]
            1 => Some(Self::Gzip),
            #[cfg(feature = "compression-zstd")]
            4 => Some(Self::Zstd),
            _ => None,
        }
    }

    /// The wire codec id.
    pub fn id(&self) -> i8 {
        match self {
            Self::Uncompressed => 0,
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => 1,
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uncompressed => "none",
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => "gzip",
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => "zstd",
        }
    }

    /// Returns true if this codec leaves data as-is.
    pub fn is_uncompressed(&self) -> bool {
        matches!(self, Self::Uncompressed)
    }

    /// Get the codec implementation.
    ///
    /// Returns `None` for [`CompressionCodec::Uncompressed`].
    pub fn codec(&self) -> Option<BoxedCodec> {
        match self {
            Self::Uncompressed => None,
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => Some(BoxedCodec::new(GzipCodec::default())),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => Some(BoxedCodec::new(ZstdCodec::default())),
        }
    }

    /// Get the codec implementation with the specified compression level.
    #[allow(unused_variables)]
    pub fn codec_with_level(&self, level: CompressionLevel) -> Option<BoxedCodec> {
        match self {
            Self::Uncompressed => None,
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => Some(BoxedCodec::new(GzipCodec::new(level))),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => Some(BoxedCodec::new(ZstdCodec::new(level))),
        }
    }
}

impl TryFrom<i8> for CompressionCodec {
    type Error = DecodingError;

    /// Like [`CompressionCodec::from_id`], failing with
    /// [`DecodingError::UnsupportedCompression`] for codecs not built in.
    fn try_from(id: i8) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or(DecodingError::UnsupportedCompression(id))
    }
}

/// Compression level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Fastest compression (lowest ratio).
    Fastest,
    /// Best compression (highest ratio, slowest).
    Best,
    /// Default compression level for each algorithm.
    #[default]
    Default,
    /// Precise compression level (algorithm-specific value).
    Precise(u32),
}

impl CompressionLevel {
    /// Create a compression level with a precise value.
    ///
    /// The value interpretation is algorithm-specific:
    /// - gzip: 0-9 (0=no compression, 9=best)
    /// - zstd: 1-22 (1=fastest, 22=best)
    pub fn precise(level: u32) -> Self {
        CompressionLevel::Precise(level)
    }
}

/// Compression configuration.
#[derive(Debug, Clone, Copy)]
pub struct CompressionConfig {
    /// Minimum bytes before compression is applied.
    /// Regions smaller than this threshold are written uncompressed.
    pub min_bytes: usize,
    /// Compression level/quality.
    pub level: CompressionLevel,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_bytes: 0,
            level: CompressionLevel::Default,
        }
    }
}

impl CompressionConfig {
    /// Create a new compression config with the specified minimum bytes threshold.
    pub fn new(min_bytes: usize) -> Self {
        Self {
            min_bytes,
            level: CompressionLevel::Default,
        }
    }

    /// Set the compression level.
    pub fn level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    /// Disable compression by setting threshold to usize::MAX.
    pub fn disabled() -> Self {
        Self {
            min_bytes: usize::MAX,
            level: CompressionLevel::Default,
        }
    }

    /// Check if compression is effectively disabled.
    pub fn is_disabled(&self) -> bool {
        self.min_bytes == usize::MAX
    }

    /// Pick the codec to use for a region of `len` bytes, or `None` to
    /// leave it uncompressed.
    pub fn select(&self, codec: CompressionCodec, len: usize) -> Option<BoxedCodec> {
        if codec.is_uncompressed() || self.is_disabled() || len < self.min_bytes {
            return None;
        }
        codec.codec_with_level(self.level)
    }
}
