//! Record batch compression codecs.
//!
//! A [`Codec`] is identified by the codec id the wire carries in a batch's
//! attributes (see [`CompressionCodec`]). Decompression is always bounded:
//! a region may not expand past the limit the caller passes, which keeps a
//! small compressed payload from claiming unbounded memory.
//!
//! - [`GzipCodec`]: id 1, requires the `compression-gzip` feature
//! - [`ZstdCodec`]: id 4, requires the `compression-zstd` feature

use std::fmt;
use std::io;
#[cfg(any(feature = "compression-gzip", feature = "compression-zstd"))]
use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;

use crate::compression::CompressionCodec;
#[cfg(any(feature = "compression-gzip", feature = "compression-zstd"))]
use crate::compression::CompressionLevel;
use crate::error::{DecodingError, EncodingError};

/// A compression algorithm for embedded byte regions.
pub trait Codec: Send + Sync + 'static {
    /// Codec id as carried on the wire.
    fn id(&self) -> i8;

    fn compress(&self, data: &[u8]) -> io::Result<Bytes>;

    /// Expand `data`. Implementations may stop as soon as the output grows
    /// past `limit` bytes; anything longer than `limit` is rejected by
    /// [`BoxedCodec::decompress`].
    fn decompress(&self, data: &[u8], limit: usize) -> io::Result<Bytes>;
}

/// Shared, type-erased [`Codec`]. `None` in an `Option<&BoxedCodec>`
/// means the region is stored as-is.
#[derive(Clone)]
pub struct BoxedCodec(Arc<dyn Codec>);

impl BoxedCodec {
    pub fn new<C: Codec>(codec: C) -> Self {
        BoxedCodec(Arc::new(codec))
    }

    pub fn id(&self) -> i8 {
        self.0.id()
    }

    /// The built-in codec this id names, if any.
    pub fn compression(&self) -> Option<CompressionCodec> {
        CompressionCodec::from_id(self.id())
    }

    pub fn compress(&self, data: &[u8]) -> Result<Bytes, EncodingError> {
        self.0
            .compress(data)
            .map_err(|e| EncodingError::Compression(e.to_string()))
    }

    /// Expand `data`, failing with [`DecodingError::DecompressionLimit`]
    /// if the output would exceed `limit` bytes.
    pub fn decompress(&self, data: &[u8], limit: usize) -> Result<Bytes, DecodingError> {
        let expanded = self
            .0
            .decompress(data, limit)
            .map_err(|e| DecodingError::Decompression(e.to_string()))?;
        if expanded.len() > limit {
            return Err(DecodingError::DecompressionLimit { limit });
        }
        Ok(expanded)
    }
}

impl fmt::Debug for BoxedCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedCodec").field("id", &self.id()).finish()
    }
}

/// Drain `reader`, stopping one byte past `limit`.
#[cfg(any(feature = "compression-gzip", feature = "compression-zstd"))]
fn read_bounded<R: Read>(reader: R, limit: usize) -> io::Result<Bytes> {
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut out = Vec::new();
    reader.take(cap).read_to_end(&mut out)?;
    Ok(Bytes::from(out))
}

/// Gzip (flate2), wire id 1.
#[cfg(feature = "compression-gzip")]
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec {
    level: flate2::Compression,
}

#[cfg(feature = "compression-gzip")]
impl GzipCodec {
    pub fn new(level: CompressionLevel) -> Self {
        let level = match level {
            CompressionLevel::Fastest => flate2::Compression::fast(),
            CompressionLevel::Best => flate2::Compression::best(),
            CompressionLevel::Default => flate2::Compression::default(),
            CompressionLevel::Precise(n) => flate2::Compression::new(n.min(9)),
        };
        Self { level }
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }
}

#[cfg(feature = "compression-gzip")]
impl Default for GzipCodec {
    fn default() -> Self {
        Self::new(CompressionLevel::Default)
    }
}

#[cfg(feature = "compression-gzip")]
impl Codec for GzipCodec {
    fn id(&self) -> i8 {
        1
    }

    fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
        let mut encoder = flate2::read::GzEncoder::new(data, self.level);
        let mut out = Vec::with_capacity(data.len() / 2);
        encoder.read_to_end(&mut out)?;
        Ok(Bytes::from(out))
    }

    fn decompress(&self, data: &[u8], limit: usize) -> io::Result<Bytes> {
        read_bounded(flate2::read::GzDecoder::new(data), limit)
    }
}

/// Zstandard, wire id 4.
#[cfg(feature = "compression-zstd")]
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    level: i32,
}

#[cfg(feature = "compression-zstd")]
impl ZstdCodec {
    pub fn new(level: CompressionLevel) -> Self {
        let level = match level {
            CompressionLevel::Fastest => 1,
            CompressionLevel::Best => 22,
            CompressionLevel::Default => zstd::DEFAULT_COMPRESSION_LEVEL,
            CompressionLevel::Precise(n) => i32::try_from(n).unwrap_or(22).clamp(1, 22),
        };
        Self { level }
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

#[cfg(feature = "compression-zstd")]
impl Default for ZstdCodec {
    fn default() -> Self {
        Self::new(CompressionLevel::Default)
    }
}

#[cfg(feature = "compression-zstd")]
impl Codec for ZstdCodec {
    fn id(&self) -> i8 {
        4
    }

    fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
        zstd::bulk::compress(data, self.level).map(Bytes::from)
    }

    fn decompress(&self, data: &[u8], limit: usize) -> io::Result<Bytes> {
        read_bounded(zstd::Decoder::new(data)?, limit)
    }
}

/// Compress a region with `codec`, or return it unchanged for `None`.
pub fn compress_region(data: &[u8], codec: Option<&BoxedCodec>) -> Result<Bytes, EncodingError> {
    match codec {
        Some(codec) => codec.compress(data),
        None => Ok(Bytes::copy_from_slice(data)),
    }
}

/// Expand a region with `codec`, or return it unchanged for `None`.
///
/// # Errors
/// - [`DecodingError::Decompression`] if the codec rejects the data
/// - [`DecodingError::DecompressionLimit`] if the result exceeds `limit`
pub fn decompress_region(
    data: &[u8],
    codec: Option<&BoxedCodec>,
    limit: usize,
) -> Result<Bytes, DecodingError> {
    match codec {
        Some(codec) => codec.decompress(data, limit),
        None if data.len() > limit => Err(DecodingError::DecompressionLimit { limit }),
        None => Ok(Bytes::copy_from_slice(data)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCH: &[u8] = b"record-0 record-1 record-2 record-3 record-4";

    /// Expands every input byte into `factor` zero bytes and ignores the
    /// limit, like a hostile codec would.
    struct Inflate {
        factor: usize,
    }

    impl Codec for Inflate {
        fn id(&self) -> i8 {
            3
        }

        fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
            Ok(Bytes::copy_from_slice(data))
        }

        fn decompress(&self, data: &[u8], _limit: usize) -> io::Result<Bytes> {
            Ok(Bytes::from(vec![0u8; data.len() * self.factor]))
        }
    }

    #[test]
    fn test_boxed_codec_rejects_output_over_limit() {
        let codec = BoxedCodec::new(Inflate { factor: 10 });
        assert_eq!(codec.decompress(b"ab", 20).unwrap().len(), 20);
        assert_eq!(
            codec.decompress(b"abc", 20),
            Err(DecodingError::DecompressionLimit { limit: 20 })
        );
    }

    #[test]
    fn test_region_passthrough() {
        assert_eq!(&compress_region(BATCH, None).unwrap()[..], BATCH);
        assert_eq!(&decompress_region(BATCH, None, BATCH.len()).unwrap()[..], BATCH);
        assert_eq!(
            decompress_region(BATCH, None, BATCH.len() - 1),
            Err(DecodingError::DecompressionLimit {
                limit: BATCH.len() - 1
            })
        );
    }

    #[test]
    fn test_boxed_codec_debug_shows_id() {
        let codec = BoxedCodec::new(Inflate { factor: 1 });
        assert_eq!(format!("{codec:?}"), "BoxedCodec { id: 3 }");
        assert_eq!(codec.compression(), None);
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_round_trip() {
        let codec = BoxedCodec::new(GzipCodec::default());
        assert_eq!(codec.compression(), Some(CompressionCodec::Gzip));

        let compressed = codec.compress(BATCH).unwrap();
        assert_ne!(&compressed[..], BATCH);
        assert_eq!(&codec.decompress(&compressed, 1024).unwrap()[..], BATCH);
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_levels() {
        assert_eq!(GzipCodec::new(CompressionLevel::Precise(42)).level(), 9);
        assert_eq!(GzipCodec::new(CompressionLevel::Fastest).level(), 1);
        assert_eq!(GzipCodec::default().level(), 6);
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_bomb_is_bounded() {
        let codec = BoxedCodec::new(GzipCodec::new(CompressionLevel::Best));
        let zeros = vec![0u8; 1 << 20];
        let compressed = codec.compress(&zeros).unwrap();
        assert!(compressed.len() < 4096);

        assert_eq!(
            codec.decompress(&compressed, 1 << 16),
            Err(DecodingError::DecompressionLimit { limit: 1 << 16 })
        );
        assert_eq!(codec.decompress(&compressed, 1 << 20).unwrap().len(), 1 << 20);
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_invalid_data() {
        let codec = BoxedCodec::new(GzipCodec::default());
        assert!(matches!(
            codec.decompress(b"not gzip", 1024),
            Err(DecodingError::Decompression(_))
        ));
    }

    #[cfg(feature = "compression-zstd")]
    #[test]
    fn test_zstd_round_trip_and_bound() {
        let codec = BoxedCodec::new(ZstdCodec::new(CompressionLevel::Precise(19)));
        assert_eq!(codec.compression(), Some(CompressionCodec::Zstd));

        let compressed = codec.compress(BATCH).unwrap();
        assert_eq!(&codec.decompress(&compressed, BATCH.len()).unwrap()[..], BATCH);
        assert_eq!(
            codec.decompress(&compressed, BATCH.len() - 1),
            Err(DecodingError::DecompressionLimit {
                limit: BATCH.len() - 1
            })
        );
    }
}
