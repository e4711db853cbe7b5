//! Decode cursor.
//!
//! [`PacketDecoder`] is the set of primitive reads a message uses to fill
//! itself in; [`RealDecoder`] implements it over an immutable byte slice.
//! Every read advances the offset by exactly the bytes it consumed, and a
//! read that fails for lack of data leaves the offset where it was.

use kwire_core::{BoxedCodec, DecodingError, MAX_RESPONSE_SIZE, Metrics, decompress_region};

use crate::push::PushField;
use crate::varint;

/// Primitive decode operations.
///
/// All multi-byte integers are big-endian.
pub trait PacketDecoder {
    fn get_i8(&mut self) -> Result<i8, DecodingError>;

    fn get_i16(&mut self) -> Result<i16, DecodingError>;

    fn get_i32(&mut self) -> Result<i32, DecodingError>;

    fn get_i64(&mut self) -> Result<i64, DecodingError>;

    /// Zig-zag varint.
    fn get_varint(&mut self) -> Result<i64, DecodingError>;

    fn get_uvarint(&mut self) -> Result<u64, DecodingError>;

    /// `i32` array length; `None` for a null array (`-1`).
    fn get_array_length(&mut self) -> Result<Option<usize>, DecodingError>;

    /// Compact array length (`len + 1`); `None` for a null array (`0`).
    fn get_compact_array_length(&mut self) -> Result<Option<usize>, DecodingError>;

    /// `i32` length then bytes; `None` for length `-1`.
    fn get_bytes(&mut self) -> Result<Option<Vec<u8>>, DecodingError>;

    /// Varint length then bytes; `None` for length `-1`.
    fn get_varint_bytes(&mut self) -> Result<Option<Vec<u8>>, DecodingError>;

    /// Uvarint `len + 1` then bytes.
    fn get_compact_bytes(&mut self) -> Result<Vec<u8>, DecodingError>;

    /// `i16` length then UTF-8.
    fn get_string(&mut self) -> Result<String, DecodingError>;

    /// `i16` length then UTF-8; `None` for length `-1`.
    fn get_nullable_string(&mut self) -> Result<Option<String>, DecodingError>;

    /// Uvarint `len + 1` then UTF-8.
    fn get_compact_string(&mut self) -> Result<String, DecodingError>;

    /// Uvarint `len + 1` then UTF-8; `None` for `0`.
    fn get_compact_nullable_string(&mut self) -> Result<Option<String>, DecodingError>;

    /// Skip a tagged-field section, returning how many fields it held.
    fn get_empty_tagged_field_array(&mut self) -> Result<usize, DecodingError>;

    /// `len` bytes with no length prefix.
    fn get_raw_bytes(&mut self, len: usize) -> Result<Vec<u8>, DecodingError>;

    /// Bytes not yet consumed.
    fn remaining(&self) -> usize;

    /// Bytes consumed so far.
    fn offset(&self) -> usize;

    /// Read the reserved bytes of a deferred field; the region it covers
    /// runs until the matching [`pop`](PacketDecoder::pop).
    fn push(&mut self, field: PushField) -> Result<(), DecodingError>;

    /// Close the most recently pushed field, checking it against the bytes
    /// read since the push.
    fn pop(&mut self) -> Result<(), DecodingError>;

    /// The instrumentation handle attached to this cursor.
    fn metrics(&self) -> &Metrics;

    fn get_bool(&mut self) -> Result<bool, DecodingError> {
        match self.get_i8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodingError::InvalidBool(other as u8)),
        }
    }

    /// An array of strings; a null array decodes as empty.
    fn get_string_array(&mut self) -> Result<Vec<String>, DecodingError> {
        let len = self.get_array_length()?.unwrap_or(0);
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(self.get_string()?);
        }
        Ok(values)
    }

    /// An array of `i32`; a null array decodes as empty.
    fn get_i32_array(&mut self) -> Result<Vec<i32>, DecodingError> {
        let len = self.get_array_length()?.unwrap_or(0);
        if len.saturating_mul(4) > self.remaining() {
            return Err(DecodingError::insufficient(len.saturating_mul(4), self.remaining()));
        }
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(self.get_i32()?);
        }
        Ok(values)
    }

    /// Read a region written by
    /// [`put_compressed_bytes`](crate::PacketEncoder::put_compressed_bytes)
    /// and decompress it with `codec`.
    ///
    /// The expanded region may not exceed [`MAX_RESPONSE_SIZE`]; a larger
    /// one fails with [`DecodingError::DecompressionLimit`].
    fn get_compressed_bytes(
        &mut self,
        codec: Option<&BoxedCodec>,
    ) -> Result<Vec<u8>, DecodingError> {
        let data = self.get_bytes()?.ok_or(DecodingError::InvalidStringLength(-1))?;
        let expanded = decompress_region(&data, codec, MAX_RESPONSE_SIZE)?;
        Ok(expanded.to_vec())
    }
}

/// Decode cursor over an immutable byte slice.
#[derive(Debug)]
pub struct RealDecoder<'a> {
    raw: &'a [u8],
    off: usize,
    stack: Vec<(PushField, usize, [u8; 4])>,
    metrics: Metrics,
}

impl<'a> RealDecoder<'a> {
    /// Create a cursor at offset zero with `metrics` attached.
    pub fn new(raw: &'a [u8], metrics: Metrics) -> Self {
        Self {
            raw,
            off: 0,
            stack: Vec::new(),
            metrics,
        }
    }

    /// Check that the message closed every pushed field and consumed the
    /// whole slice.
    ///
    /// # Errors
    /// - [`DecodingError::UnbalancedPush`] if a pushed field was never popped
    /// - [`DecodingError::InvalidLength`] if bytes remain
    pub fn finish(&self) -> Result<(), DecodingError> {
        if !self.stack.is_empty() {
            return Err(DecodingError::UnbalancedPush);
        }
        if self.off != self.raw.len() {
            return Err(DecodingError::InvalidLength {
                offset: self.off,
                length: self.raw.len(),
            });
        }
        Ok(())
    }

    /// Total length of the underlying slice.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodingError> {
        let raw = self.raw;
        let remaining = raw.len() - self.off;
        if len > remaining {
            return Err(DecodingError::insufficient(len, remaining));
        }
        let start = self.off;
        self.off += len;
        Ok(&raw[start..start + len])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodingError> {
        let bytes = self.take(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    fn take_string(&mut self, len: usize) -> Result<String, DecodingError> {
        let start = self.off;
        let bytes = self.take(len)?;
        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_owned()),
            Err(_) => {
                self.off = start;
                Err(DecodingError::InvalidUtf8)
            }
        }
    }

    /// Run `read` and rewind to the starting offset if it fails.
    fn rewind_on_error<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, DecodingError>,
    ) -> Result<T, DecodingError> {
        let start = self.off;
        let result = read(self);
        if result.is_err() {
            self.off = start;
        }
        result
    }

    fn region_length(len: i64) -> Result<Option<usize>, DecodingError> {
        match len {
            -1 => Ok(None),
            n if n < -1 => Err(DecodingError::InvalidStringLength(n)),
            n => usize::try_from(n)
                .map(Some)
                .map_err(|_| DecodingError::InvalidStringLength(n)),
        }
    }
}

impl PacketDecoder for RealDecoder<'_> {
    fn get_i8(&mut self) -> Result<i8, DecodingError> {
        Ok(i8::from_be_bytes(self.take_array()?))
    }

    fn get_i16(&mut self) -> Result<i16, DecodingError> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    fn get_i32(&mut self) -> Result<i32, DecodingError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    fn get_i64(&mut self) -> Result<i64, DecodingError> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    fn get_varint(&mut self) -> Result<i64, DecodingError> {
        let (value, len) = varint::read_varint(&self.raw[self.off..])?;
        self.off += len;
        Ok(value)
    }

    fn get_uvarint(&mut self) -> Result<u64, DecodingError> {
        let (value, len) = varint::read_uvarint(&self.raw[self.off..])?;
        self.off += len;
        Ok(value)
    }

    fn get_array_length(&mut self) -> Result<Option<usize>, DecodingError> {
        let start = self.off;
        let n = self.get_i32()?;
        if n == -1 {
            return Ok(None);
        }
        if n < -1 {
            self.off = start;
            return Err(DecodingError::InvalidArrayLength(i64::from(n)));
        }

        // every element takes at least one byte
        let len = n as usize;
        if len > self.remaining() {
            let remaining = self.remaining();
            self.off = self.raw.len();
            return Err(DecodingError::insufficient(len, remaining));
        }
        if len > MAX_RESPONSE_SIZE {
            self.off = start;
            return Err(DecodingError::InvalidArrayLength(i64::from(n)));
        }
        Ok(Some(len))
    }

    fn get_compact_array_length(&mut self) -> Result<Option<usize>, DecodingError> {
        let start = self.off;
        let n = self.get_uvarint()?;
        if n == 0 {
            return Ok(None);
        }

        let len = usize::try_from(n - 1).unwrap_or(usize::MAX);
        if len > self.remaining() {
            let remaining = self.remaining();
            self.off = self.raw.len();
            return Err(DecodingError::insufficient(len, remaining));
        }
        if len > MAX_RESPONSE_SIZE {
            self.off = start;
            let len = i64::try_from(len).unwrap_or(i64::MAX);
            return Err(DecodingError::InvalidArrayLength(len));
        }
        Ok(Some(len))
    }

    fn get_bytes(&mut self) -> Result<Option<Vec<u8>>, DecodingError> {
        self.rewind_on_error(|pd| {
            let len = pd.get_i32()?;
            match Self::region_length(i64::from(len))? {
                Some(len) => pd.take(len).map(|b| Some(b.to_vec())),
                None => Ok(None),
            }
        })
    }

    fn get_varint_bytes(&mut self) -> Result<Option<Vec<u8>>, DecodingError> {
        self.rewind_on_error(|pd| {
            let len = pd.get_varint()?;
            match Self::region_length(len)? {
                Some(len) => pd.take(len).map(|b| Some(b.to_vec())),
                None => Ok(None),
            }
        })
    }

    fn get_compact_bytes(&mut self) -> Result<Vec<u8>, DecodingError> {
        self.rewind_on_error(|pd| {
            let n = pd.get_uvarint()?;
            let len = Self::region_length((n as i64).wrapping_sub(1))?
                .ok_or(DecodingError::InvalidStringLength(-1))?;
            pd.take(len).map(<[u8]>::to_vec)
        })
    }

    fn get_string(&mut self) -> Result<String, DecodingError> {
        self.rewind_on_error(|pd| {
            let n = pd.get_i16()?;
            if n < 0 {
                return Err(DecodingError::InvalidStringLength(i64::from(n)));
            }
            pd.take_string(n as usize)
        })
    }

    fn get_nullable_string(&mut self) -> Result<Option<String>, DecodingError> {
        self.rewind_on_error(|pd| {
            let n = pd.get_i16()?;
            match Self::region_length(i64::from(n))? {
                Some(len) => pd.take_string(len).map(Some),
                None => Ok(None),
            }
        })
    }

    fn get_compact_string(&mut self) -> Result<String, DecodingError> {
        self.rewind_on_error(|pd| {
            let n = pd.get_uvarint()?;
            let len = Self::region_length((n as i64).wrapping_sub(1))?
                .ok_or(DecodingError::InvalidStringLength(-1))?;
            pd.take_string(len)
        })
    }

    fn get_compact_nullable_string(&mut self) -> Result<Option<String>, DecodingError> {
        self.rewind_on_error(|pd| {
            let n = pd.get_uvarint()?;
            match Self::region_length((n as i64).wrapping_sub(1))? {
                Some(len) => pd.take_string(len).map(Some),
                None => Ok(None),
            }
        })
    }

    fn get_empty_tagged_field_array(&mut self) -> Result<usize, DecodingError> {
        self.rewind_on_error(|pd| {
            let count = pd.get_uvarint()?;
            for _ in 0..count {
                // tag identifier, then the field's size and body
                pd.get_uvarint()?;
                let size = pd.get_uvarint()?;
                let size = usize::try_from(size)
                    .map_err(|_| DecodingError::insufficient(usize::MAX, pd.remaining()))?;
                pd.take(size)?;
            }
            usize::try_from(count).map_err(|_| DecodingError::InvalidArrayLength(i64::MAX))
        })
    }

    fn get_raw_bytes(&mut self, len: usize) -> Result<Vec<u8>, DecodingError> {
        self.take(len).map(<[u8]>::to_vec)
    }

    fn remaining(&self) -> usize {
        self.raw.len() - self.off
    }

    fn offset(&self) -> usize {
        self.off
    }

    fn push(&mut self, field: PushField) -> Result<(), DecodingError> {
        let start = self.off;
        let declared = self.take_array::<4>()?;
        self.stack.push((field, start, declared));
        Ok(())
    }

    fn pop(&mut self) -> Result<(), DecodingError> {
        let (field, start, declared) = self.stack.pop().ok_or(DecodingError::UnbalancedPush)?;
        field.check(start, declared, self.off, self.raw)
    }

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder(raw: &[u8]) -> RealDecoder<'_> {
        RealDecoder::new(raw, Metrics::noop())
    }

    #[test]
    fn test_get_integers() {
        let raw = [0xff, 0x01, 0x02, 0, 0, 0, 42, 0, 0, 0, 0, 0, 0, 0, 7];
        let mut pd = decoder(&raw);

        assert_eq!(pd.get_i8().unwrap(), -1);
        assert_eq!(pd.get_i16().unwrap(), 0x0102);
        assert_eq!(pd.get_i32().unwrap(), 42);
        assert_eq!(pd.get_i64().unwrap(), 7);
        assert_eq!(pd.remaining(), 0);
        assert_eq!(pd.offset(), raw.len());
    }

    #[test]
    fn test_short_read_keeps_offset() {
        let raw = [0, 0, 0];
        let mut pd = decoder(&raw);

        assert_eq!(pd.get_i32(), Err(DecodingError::insufficient(4, 3)));
        assert_eq!(pd.offset(), 0);
        assert_eq!(pd.get_i16().unwrap(), 0);
    }

    #[test]
    fn test_get_bool() {
        let mut pd = decoder(&[0, 1, 2]);
        assert!(!pd.get_bool().unwrap());
        assert!(pd.get_bool().unwrap());
        assert_eq!(pd.get_bool(), Err(DecodingError::InvalidBool(2)));
    }

    #[test]
    fn test_get_string() {
        let mut pd = decoder(&[0, 2, b'h', b'i', 0xff, 0xff]);
        assert_eq!(pd.get_string().unwrap(), "hi");
        assert_eq!(pd.get_string(), Err(DecodingError::InvalidStringLength(-1)));
        assert_eq!(pd.offset(), 4);
    }

    #[test]
    fn test_get_string_truncated() {
        let mut pd = decoder(&[0, 5, b'h', b'i']);
        assert_eq!(pd.get_string(), Err(DecodingError::insufficient(5, 2)));
        assert_eq!(pd.offset(), 0);
    }

    #[test]
    fn test_get_string_invalid_utf8() {
        let mut pd = decoder(&[0, 2, 0xc3, 0x28]);
        assert_eq!(pd.get_string(), Err(DecodingError::InvalidUtf8));
        assert_eq!(pd.offset(), 0);
    }

    #[test]
    fn test_get_nullable_string() {
        let mut pd = decoder(&[0xff, 0xff, 0, 1, b'x']);
        assert_eq!(pd.get_nullable_string().unwrap(), None);
        assert_eq!(pd.get_nullable_string().unwrap(), Some("x".to_string()));
    }

    #[test]
    fn test_get_compact_strings() {
        let mut pd = decoder(&[4, b'a', b'b', b'c', 0, 0]);
        assert_eq!(pd.get_compact_string().unwrap(), "abc");
        assert_eq!(pd.get_compact_nullable_string().unwrap(), None);
        assert_eq!(pd.get_compact_string(), Err(DecodingError::InvalidStringLength(-1)));
    }

    #[test]
    fn test_get_bytes() {
        let mut pd = decoder(&[0, 0, 0, 2, 9, 8, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe]);
        assert_eq!(pd.get_bytes().unwrap(), Some(vec![9, 8]));
        assert_eq!(pd.get_bytes().unwrap(), None);
        assert_eq!(pd.get_bytes(), Err(DecodingError::InvalidStringLength(-2)));
    }

    #[test]
    fn test_get_varint_bytes() {
        // zig-zag 2 => 1 byte, zig-zag -1 => null
        let mut pd = decoder(&[0x02, 0x07, 0x01]);
        assert_eq!(pd.get_varint_bytes().unwrap(), Some(vec![7]));
        assert_eq!(pd.get_varint_bytes().unwrap(), None);
    }

    #[test]
    fn test_get_array_length() {
        let mut pd = decoder(&[0, 0, 0, 1, 0xaa, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(pd.get_array_length().unwrap(), Some(1));
        assert_eq!(pd.get_i8().unwrap(), 0xaa_u8 as i8);
        assert_eq!(pd.get_array_length().unwrap(), None);
    }

    #[test]
    fn test_get_array_length_invalid() {
        let raw = (-2i32).to_be_bytes();
        let mut pd = decoder(&raw);
        assert_eq!(pd.get_array_length(), Err(DecodingError::InvalidArrayLength(-2)));
        assert_eq!(pd.offset(), 0);
    }

    #[test]
    fn test_get_array_length_exceeds_remaining() {
        let raw = [0, 0, 0, 9, 1, 2];
        let mut pd = decoder(&raw);
        assert_eq!(pd.get_array_length(), Err(DecodingError::insufficient(9, 2)));
        assert_eq!(pd.remaining(), 0);
    }

    #[test]
    fn test_get_compact_array_length() {
        let mut pd = decoder(&[0, 3, 1, 2]);
        assert_eq!(pd.get_compact_array_length().unwrap(), None);
        assert_eq!(pd.get_compact_array_length().unwrap(), Some(2));
    }

    #[test]
    fn test_array_lengths_exceeding_remaining_agree() {
        let mut pd = decoder(&[0, 0, 0, 9, 1, 2]);
        assert_eq!(pd.get_array_length(), Err(DecodingError::insufficient(9, 2)));
        assert_eq!(pd.remaining(), 0);

        let mut pd = decoder(&[10, 1, 2]);
        assert_eq!(
            pd.get_compact_array_length(),
            Err(DecodingError::insufficient(9, 2))
        );
        assert_eq!(pd.remaining(), 0);
    }

    #[test]
    fn test_get_compressed_bytes_uncompressed() {
        let mut pd = decoder(&[0, 0, 0, 2, 5, 6]);
        assert_eq!(pd.get_compressed_bytes(None).unwrap(), vec![5, 6]);
    }

    #[test]
    fn test_get_arrays() {
        let raw = [0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 1, 0, 1, b'z'];
        let mut pd = decoder(&raw);
        assert_eq!(pd.get_i32_array().unwrap(), vec![1, 2]);
        assert_eq!(pd.get_string_array().unwrap(), vec!["z".to_string()]);
    }

    #[test]
    fn test_get_empty_tagged_field_array_skips_fields() {
        // two fields: tag 0 with 2 bytes, tag 5 with 0 bytes
        let mut pd = decoder(&[2, 0, 2, 0xaa, 0xbb, 5, 0]);
        assert_eq!(pd.get_empty_tagged_field_array().unwrap(), 2);
        assert_eq!(pd.remaining(), 0);
    }

    #[test]
    fn test_get_empty_tagged_field_array_truncated() {
        let mut pd = decoder(&[1, 0, 4, 0xaa]);
        assert!(pd.get_empty_tagged_field_array().is_err());
        assert_eq!(pd.offset(), 0);
    }

    #[test]
    fn test_push_pop_length() {
        let mut pd = decoder(&[0, 0, 0, 2, 0, 7]);
        pd.push(PushField::Length).unwrap();
        assert_eq!(pd.get_i16().unwrap(), 7);
        pd.pop().unwrap();
    }

    #[test]
    fn test_push_pop_length_mismatch() {
        let mut pd = decoder(&[0, 0, 0, 3, 0, 7, 1]);
        pd.push(PushField::Length).unwrap();
        pd.get_i16().unwrap();
        assert_eq!(
            pd.pop(),
            Err(DecodingError::InvalidLength {
                offset: 6,
                length: 7
            })
        );
    }

    #[test]
    fn test_finish_rejects_open_push() {
        let mut pd = decoder(&[0, 0, 0, 0, 1]);
        pd.push(PushField::Crc32).unwrap();
        pd.get_i8().unwrap();
        assert_eq!(pd.remaining(), 0);
        assert_eq!(pd.finish(), Err(DecodingError::UnbalancedPush));
    }

    #[test]
    fn test_finish_rejects_trailing_bytes() {
        let mut pd = decoder(&[0, 7, 9]);
        pd.get_i16().unwrap();
        assert_eq!(
            pd.finish(),
            Err(DecodingError::InvalidLength {
                offset: 2,
                length: 3
            })
        );
        pd.get_i8().unwrap();
        assert_eq!(pd.finish(), Ok(()));
    }

    #[test]
    fn test_pop_without_push() {
        let mut pd = decoder(&[]);
        assert_eq!(pd.pop(), Err(DecodingError::UnbalancedPush));
    }

    #[test]
    fn test_varint_reads() {
        let mut pd = decoder(&[0x05, 0xac, 0x02]);
        assert_eq!(pd.get_varint().unwrap(), -3);
        assert_eq!(pd.get_uvarint().unwrap(), 300);

        let mut pd = decoder(&[0x80]);
        assert!(pd.get_uvarint().is_err());
        assert_eq!(pd.offset(), 0);
    }
}
