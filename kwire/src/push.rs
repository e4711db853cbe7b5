//! Deferred fields whose value depends on the bytes that follow them.
//!
//! A message pushes a field, writes the region it covers, then pops it.
//! On encode, the pop fills in the reserved bytes; on decode, the pop
//! checks them against what was actually read.

use kwire_core::{DecodingError, EncodingError};

/// Kind of deferred field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushField {
    /// Big-endian `i32` byte length of the covered region.
    Length,
    /// Big-endian IEEE CRC32 of the covered region.
    Crc32,
}

impl PushField {
    /// Bytes reserved in front of the covered region.
    pub const RESERVED: usize = 4;

    pub fn reserve_length(&self) -> usize {
        Self::RESERVED
    }

    /// Fill the reserved bytes at `start` for the region `start + 4 .. end`.
    pub(crate) fn fill(
        &self,
        start: usize,
        end: usize,
        raw: &mut [u8],
    ) -> Result<(), EncodingError> {
        let region_start = start + Self::RESERVED;
        let value = match self {
            PushField::Length => {
                let length = end - region_start;
                i32::try_from(length)
                    .map_err(|_| EncodingError::InvalidSize(length))?
                    .to_be_bytes()
            }
            PushField::Crc32 => {
                let region = raw.get(region_start..end).ok_or(EncodingError::BufferOverflow {
                    offset: region_start,
                    needed: end.saturating_sub(region_start),
                    capacity: raw.len(),
                })?;
                crc32fast::hash(region).to_be_bytes()
            }
        };

        let capacity = raw.len();
        let slot = raw
            .get_mut(start..region_start)
            .ok_or(EncodingError::BufferOverflow {
                offset: start,
                needed: Self::RESERVED,
                capacity,
            })?;
        slot.copy_from_slice(&value);
        Ok(())
    }

    /// Check the `declared` reserved bytes at `start` against the region
    /// `start + 4 .. end`.
    pub(crate) fn check(
        &self,
        start: usize,
        declared: [u8; 4],
        end: usize,
        raw: &[u8],
    ) -> Result<(), DecodingError> {
        let region_start = start + Self::RESERVED;
        match self {
            PushField::Length => {
                let declared = i32::from_be_bytes(declared);
                let consumed = end - region_start;
                if i64::from(declared) != consumed as i64 {
                    return Err(DecodingError::InvalidLength {
                        offset: end,
                        length: region_start.saturating_add_signed(declared as isize),
                    });
                }
            }
            PushField::Crc32 => {
                let expected = u32::from_be_bytes(declared);
                let region = raw
                    .get(region_start..end)
                    .ok_or(DecodingError::insufficient(end - region_start, raw.len()))?;
                let actual = crc32fast::hash(region);
                if expected != actual {
                    return Err(DecodingError::ChecksumMismatch { expected, actual });
                }
            }
        }
        Ok(())
    }
}
