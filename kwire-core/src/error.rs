//! Wire error families.
//!
//! Two families, never conflated:
//! - [`EncodingError`]: a message could not be turned into bytes
//! - [`DecodingError`]: bytes could not be turned into a valid message
//!
//! Both are terminal for the call that produced them. Nothing in this
//! workspace logs or retries them; callers decide what to do.

/// Errors raised while encoding a message into bytes.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// The measured size is larger than [`MAX_REQUEST_SIZE`](crate::MAX_REQUEST_SIZE).
    #[error("invalid request size ({0})")]
    InvalidSize(usize),

    /// The writing pass produced a different number of bytes than the
    /// measuring pass. The message's fill routine is not deterministic.
    #[error("encoded size mismatch: measured {measured} bytes, wrote {written}")]
    SizeMismatch { measured: usize, written: usize },

    /// A write did not fit in the preallocated buffer.
    #[error("buffer overflow: {needed} bytes at offset {offset} exceeds capacity {capacity}")]
    BufferOverflow {
        offset: usize,
        needed: usize,
        capacity: usize,
    },

    /// An array is too long for its length prefix.
    #[error("invalid array length ({0})")]
    InvalidArrayLength(usize),

    /// A string or byte region is too long for its length prefix.
    #[error("invalid string length ({0})")]
    InvalidStringLength(usize),

    /// `pop` was called with no matching `push`, or encoding finished
    /// with a pushed field still open.
    #[error("unbalanced push/pop")]
    UnbalancedPush,

    /// Compression of an embedded region failed.
    #[error("compression failed: {0}")]
    Compression(String),

    /// A message-level failure raised by a message type.
    #[error("{0}")]
    Message(String),
}

impl EncodingError {
    /// Create a message-level encoding error.
    pub fn message<S: Into<String>>(message: S) -> Self {
        EncodingError::Message(message.into())
    }
}

/// Errors raised while decoding bytes into a message.
///
/// A message whose decode failed may be partially filled; none of its
/// fields should be trusted.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodingError {
    /// The decoder did not consume exactly the bytes it was given, or a
    /// length field disagrees with the bytes actually read.
    #[error("invalid length (off={offset}, len={length})")]
    InvalidLength { offset: usize, length: usize },

    /// A read needed more bytes than remain in the buffer.
    #[error("insufficient data to decode packet, more bytes expected (needed {needed}, remaining {remaining})")]
    InsufficientData { needed: usize, remaining: usize },

    /// An array length prefix is negative (other than null) or too large.
    #[error("invalid array length ({0})")]
    InvalidArrayLength(i64),

    /// A string or byte region length prefix is invalid.
    #[error("invalid string length ({0})")]
    InvalidStringLength(i64),

    /// A boolean byte other than 0 or 1.
    #[error("invalid bool value ({0})")]
    InvalidBool(u8),

    /// A string field is not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// A varint runs longer than ten bytes.
    #[error("varint overflow")]
    VarintOverflow,

    /// A frame size prefix is negative or too large.
    #[error("invalid frame size ({0})")]
    InvalidFrameSize(i64),

    /// A CRC32 field does not match the bytes it covers.
    #[error("crc mismatch: expected 0x{expected:08x}, computed 0x{actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// `pop` was called with no matching `push`, or the message returned
    /// with a pushed field still open.
    #[error("unbalanced push/pop")]
    UnbalancedPush,

    /// The compression codec id is unknown or not compiled in.
    #[error("unsupported compression codec ({0})")]
    UnsupportedCompression(i8),

    /// Decompression of an embedded region failed.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// A compressed region expands past the allowed size.
    #[error("decompressed region exceeds {limit} bytes")]
    DecompressionLimit { limit: usize },

    /// A message-level failure raised by a message type.
    #[error("{0}")]
    Message(String),
}

impl DecodingError {
    /// Create a message-level decoding error.
    pub fn message<S: Into<String>>(message: S) -> Self {
        DecodingError::Message(message.into())
    }

    /// Insufficient data for a read of `needed` bytes with `remaining` left.
    pub fn insufficient(needed: usize, remaining: usize) -> Self {
        DecodingError::InsufficientData { needed, remaining }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_error_display() {
        assert_eq!(
            EncodingError::InvalidSize(104_857_601).to_string(),
            "invalid request size (104857601)"
        );

        let err = EncodingError::BufferOverflow {
            offset: 2,
            needed: 4,
            capacity: 4,
        };
        assert_eq!(
            err.to_string(),
            "buffer overflow: 4 bytes at offset 2 exceeds capacity 4"
        );

        let err = EncodingError::SizeMismatch {
            measured: 8,
            written: 4,
        };
        assert_eq!(
            err.to_string(),
            "encoded size mismatch: measured 8 bytes, wrote 4"
        );

        assert_eq!(EncodingError::message("bad record").to_string(), "bad record");
    }

    #[test]
    fn test_decoding_error_display() {
        let err = DecodingError::InvalidLength {
            offset: 4,
            length: 5,
        };
        assert_eq!(err.to_string(), "invalid length (off=4, len=5)");

        let err = DecodingError::ChecksumMismatch {
            expected: 0xdeadbeef,
            actual: 0x1,
        };
        assert_eq!(
            err.to_string(),
            "crc mismatch: expected 0xdeadbeef, computed 0x00000001"
        );

        assert_eq!(DecodingError::InvalidBool(7).to_string(), "invalid bool value (7)");
        assert_eq!(
            DecodingError::UnsupportedCompression(2).to_string(),
            "unsupported compression codec (2)"
        );
        assert_eq!(
            DecodingError::DecompressionLimit { limit: 1024 }.to_string(),
            "decompressed region exceeds 1024 bytes"
        );
        assert_eq!(DecodingError::UnbalancedPush.to_string(), "unbalanced push/pop");
    }

    #[test]
    fn test_decoding_error_insufficient() {
        assert_eq!(
            DecodingError::insufficient(4, 3),
            DecodingError::InsufficientData {
                needed: 4,
                remaining: 3
            }
        );
    }
}
