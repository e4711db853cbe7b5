//! Encode cursors.
//!
//! This module provides:
//! - [`PacketEncoder`]: the primitive operations a message uses to fill itself in
//! - [`PrepEncoder`]: measuring mode, counts bytes without writing any
//! - [`RealEncoder`]: writing mode, fills a buffer of exactly the measured size
//!
//! Only a handful of operations are required; strings, byte regions, array
//! lengths and the rest are provided in terms of them, so both modes agree
//! on sizes by construction.

use bytes::Bytes;
use kwire_core::{BoxedCodec, EncodingError, Metrics, compress_region};

use crate::push::PushField;
use crate::varint::{self, MAX_VARINT_LEN};

/// Primitive encode operations.
///
/// All multi-byte integers are big-endian.
pub trait PacketEncoder {
    fn put_i8(&mut self, value: i8) -> Result<(), EncodingError>;

    fn put_i16(&mut self, value: i16) -> Result<(), EncodingError>;

    fn put_i32(&mut self, value: i32) -> Result<(), EncodingError>;

    fn put_i64(&mut self, value: i64) -> Result<(), EncodingError>;

    /// Zig-zag varint.
    fn put_varint(&mut self, value: i64) -> Result<(), EncodingError>;

    fn put_uvarint(&mut self, value: u64) -> Result<(), EncodingError>;

    /// Bytes with no length prefix.
    fn put_raw_bytes(&mut self, data: &[u8]) -> Result<(), EncodingError>;

    /// Bytes written so far.
    fn offset(&self) -> usize;

    /// Reserve space for a deferred field covering everything written
    /// until the matching [`pop`](PacketEncoder::pop).
    fn push(&mut self, field: PushField) -> Result<(), EncodingError>;

    /// Close the most recently pushed field.
    fn pop(&mut self) -> Result<(), EncodingError>;

    /// The instrumentation handle, attached in writing mode only.
    fn metrics(&self) -> Option<&Metrics>;

    fn put_bool(&mut self, value: bool) -> Result<(), EncodingError> {
        self.put_i8(i8::from(value))
    }

    fn put_array_length(&mut self, len: usize) -> Result<(), EncodingError> {
        let len = i32::try_from(len).map_err(|_| EncodingError::InvalidArrayLength(len))?;
        self.put_i32(len)
    }

    /// Null array marker (`-1`).
    fn put_null_array(&mut self) -> Result<(), EncodingError> {
        self.put_i32(-1)
    }

    /// Compact array length, written as `len + 1`.
    fn put_compact_array_length(&mut self, len: usize) -> Result<(), EncodingError> {
        if i32::try_from(len).is_err() {
            return Err(EncodingError::InvalidArrayLength(len));
        }
        self.put_uvarint(len as u64 + 1)
    }

    /// `i32` length then bytes; `None` is written as length `-1`.
    fn put_bytes(&mut self, data: Option<&[u8]>) -> Result<(), EncodingError> {
        let Some(data) = data else {
            return self.put_i32(-1);
        };
        let len =
            i32::try_from(data.len()).map_err(|_| EncodingError::InvalidStringLength(data.len()))?;
        self.put_i32(len)?;
        self.put_raw_bytes(data)
    }

    /// Varint length then bytes; `None` is written as length `-1`.
    fn put_varint_bytes(&mut self, data: Option<&[u8]>) -> Result<(), EncodingError> {
        let Some(data) = data else {
            return self.put_varint(-1);
        };
        self.put_varint(data.len() as i64)?;
        self.put_raw_bytes(data)
    }

    /// Uvarint `len + 1` then bytes.
    fn put_compact_bytes(&mut self, data: &[u8]) -> Result<(), EncodingError> {
        self.put_uvarint(data.len() as u64 + 1)?;
        self.put_raw_bytes(data)
    }

    /// `i16` length then UTF-8.
    fn put_string(&mut self, value: &str) -> Result<(), EncodingError> {
        let len =
            i16::try_from(value.len()).map_err(|_| EncodingError::InvalidStringLength(value.len()))?;
        self.put_i16(len)?;
        self.put_raw_bytes(value.as_bytes())
    }

    fn put_nullable_string(&mut self, value: Option<&str>) -> Result<(), EncodingError> {
        match value {
            Some(value) => self.put_string(value),
            None => self.put_i16(-1),
        }
    }

    /// Uvarint `len + 1` then UTF-8.
    fn put_compact_string(&mut self, value: &str) -> Result<(), EncodingError> {
        self.put_compact_bytes(value.as_bytes())
    }

    /// Like [`put_compact_string`](PacketEncoder::put_compact_string), with
    /// `None` written as uvarint `0`.
    fn put_compact_nullable_string(&mut self, value: Option<&str>) -> Result<(), EncodingError> {
        match value {
            Some(value) => self.put_compact_string(value),
            None => self.put_uvarint(0),
        }
    }

    fn put_string_array(&mut self, values: &[String]) -> Result<(), EncodingError> {
        self.put_array_length(values.len())?;
        for value in values {
            self.put_string(value)?;
        }
        Ok(())
    }

    fn put_i32_array(&mut self, values: &[i32]) -> Result<(), EncodingError> {
        self.put_array_length(values.len())?;
        for &value in values {
            self.put_i32(value)?;
        }
        Ok(())
    }

    /// Tagged-field section with no fields.
    fn put_empty_tagged_field_array(&mut self) -> Result<(), EncodingError> {
        self.put_uvarint(0)
    }

    /// Compress `data` with `codec` (or leave it as-is for `None`) and
    /// write the result as [`put_bytes`](PacketEncoder::put_bytes).
    ///
    /// In writing mode this records `compression_ratio` (x100) and
    /// `batch_size` on the attached handle.
    fn put_compressed_bytes(
        &mut self,
        codec: Option<&BoxedCodec>,
        data: &[u8],
    ) -> Result<(), EncodingError> {
        let compressed = compress_region(data, codec)?;

        if let Some(metrics) = self.metrics() {
            if !compressed.is_empty() {
                let ratio = data.len() as i64 * 100 / compressed.len() as i64;
                metrics.compression_ratio().record(ratio, metrics.attributes());
            }
            metrics
                .batch_size()
                .record(compressed.len() as i64, metrics.attributes());
        }

        self.put_bytes(Some(&compressed))
    }
}

/// Measuring-mode cursor.
///
/// Counts the bytes a message would write. Allocates nothing and carries
/// no instrumentation handle.
#[derive(Debug, Default)]
pub struct PrepEncoder {
    length: usize,
    stack: Vec<PushField>,
}

impl PrepEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes counted so far.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Finish measuring, returning the total length.
    ///
    /// # Errors
    /// [`EncodingError::UnbalancedPush`] if a pushed field was never popped.
    pub fn finish(self) -> Result<usize, EncodingError> {
        if !self.stack.is_empty() {
            return Err(EncodingError::UnbalancedPush);
        }
        Ok(self.length)
    }
}

impl PacketEncoder for PrepEncoder {
    fn put_i8(&mut self, _value: i8) -> Result<(), EncodingError> {
        self.length += 1;
        Ok(())
    }

    fn put_i16(&mut self, _value: i16) -> Result<(), EncodingError> {
        self.length += 2;
        Ok(())
    }

    fn put_i32(&mut self, _value: i32) -> Result<(), EncodingError> {
        self.length += 4;
        Ok(())
    }

    fn put_i64(&mut self, _value: i64) -> Result<(), EncodingError> {
        self.length += 8;
        Ok(())
    }

    fn put_varint(&mut self, value: i64) -> Result<(), EncodingError> {
        self.length += varint::varint_len(value);
        Ok(())
    }

    fn put_uvarint(&mut self, value: u64) -> Result<(), EncodingError> {
        self.length += varint::uvarint_len(value);
        Ok(())
    }

    fn put_raw_bytes(&mut self, data: &[u8]) -> Result<(), EncodingError> {
        self.length += data.len();
        Ok(())
    }

    fn offset(&self) -> usize {
        self.length
    }

    fn push(&mut self, field: PushField) -> Result<(), EncodingError> {
        self.length += field.reserve_length();
        self.stack.push(field);
        Ok(())
    }

    fn pop(&mut self) -> Result<(), EncodingError> {
        self.stack.pop().ok_or(EncodingError::UnbalancedPush)?;
        Ok(())
    }

    fn metrics(&self) -> Option<&Metrics> {
        None
    }
}

/// Writing-mode cursor.
///
/// Backed by a zero-filled buffer of a fixed size. A write that would run
/// past the end fails with [`EncodingError::BufferOverflow`] and writes
/// nothing.
#[derive(Debug)]
pub struct RealEncoder {
    raw: Vec<u8>,
    off: usize,
    stack: Vec<(PushField, usize)>,
    metrics: Metrics,
}

impl RealEncoder {
    /// Create a cursor over `capacity` bytes with `metrics` attached.
    pub fn new(capacity: usize, metrics: Metrics) -> Self {
        Self {
            raw: vec![0; capacity],
            off: 0,
            stack: Vec::new(),
            metrics,
        }
    }

    pub fn capacity(&self) -> usize {
        self.raw.len()
    }

    /// Finish writing, handing over the buffer.
    ///
    /// # Errors
    /// - [`EncodingError::UnbalancedPush`] if a pushed field was never popped
    /// - [`EncodingError::SizeMismatch`] if the buffer was not filled exactly
    pub fn finish(self) -> Result<Bytes, EncodingError> {
        if !self.stack.is_empty() {
            return Err(EncodingError::UnbalancedPush);
        }
        if self.off != self.raw.len() {
            return Err(EncodingError::SizeMismatch {
                measured: self.raw.len(),
                written: self.off,
            });
        }
        Ok(Bytes::from(self.raw))
    }

    fn write(&mut self, data: &[u8]) -> Result<(), EncodingError> {
        let capacity = self.raw.len();
        let overflow = EncodingError::BufferOverflow {
            offset: self.off,
            needed: data.len(),
            capacity,
        };
        let end = self.off.checked_add(data.len()).ok_or(overflow.clone())?;
        let slot = self.raw.get_mut(self.off..end).ok_or(overflow)?;
        slot.copy_from_slice(data);
        self.off = end;
        Ok(())
    }
}

impl PacketEncoder for RealEncoder {
    fn put_i8(&mut self, value: i8) -> Result<(), EncodingError> {
        self.write(&value.to_be_bytes())
    }

    fn put_i16(&mut self, value: i16) -> Result<(), EncodingError> {
        self.write(&value.to_be_bytes())
    }

    fn put_i32(&mut self, value: i32) -> Result<(), EncodingError> {
        self.write(&value.to_be_bytes())
    }

    fn put_i64(&mut self, value: i64) -> Result<(), EncodingError> {
        self.write(&value.to_be_bytes())
    }

    fn put_varint(&mut self, value: i64) -> Result<(), EncodingError> {
        self.put_uvarint(varint::zigzag(value))
    }

    fn put_uvarint(&mut self, value: u64) -> Result<(), EncodingError> {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let len = varint::put_uvarint(&mut buf, value);
        self.write(&buf[..len])
    }

    fn put_raw_bytes(&mut self, data: &[u8]) -> Result<(), EncodingError> {
        self.write(data)
    }

    fn offset(&self) -> usize {
        self.off
    }

    fn push(&mut self, field: PushField) -> Result<(), EncodingError> {
        let start = self.off;
        self.write(&[0; PushField::RESERVED])?;
        self.stack.push((field, start));
        Ok(())
    }

    fn pop(&mut self) -> Result<(), EncodingError> {
        let (field, start) = self.stack.pop().ok_or(EncodingError::UnbalancedPush)?;
        field.fill(start, self.off, &mut self.raw)
    }

    fn metrics(&self) -> Option<&Metrics> {
        Some(&self.metrics)
    }
}
