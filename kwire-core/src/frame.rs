//! Size-prefixed framing.
//!
//! Every request and response travels as:
//!
//! ```text
//! [length:4][payload:length]
//! ```
//!
//! where `length` is a big-endian `i32`. This module provides the size
//! limits and the functions for wrapping and parsing that prefix.

use crate::error::{DecodingError, EncodingError};

/// Maximum encoded request size accepted by the encoder (100 MiB).
pub const MAX_REQUEST_SIZE: usize = 100 * 1024 * 1024;

/// Maximum response size accepted by the decoder (100 MiB).
pub const MAX_RESPONSE_SIZE: usize = 100 * 1024 * 1024;

/// Frame header size (length prefix).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Wrap an encoded payload in a size-prefixed frame.
///
/// # Errors
/// Returns [`EncodingError::InvalidSize`] if the payload is larger than
/// [`MAX_REQUEST_SIZE`].
pub fn wrap_frame(payload: &[u8]) -> Result<Vec<u8>, EncodingError> {
    if payload.len() > MAX_REQUEST_SIZE {
        return Err(EncodingError::InvalidSize(payload.len()));
    }
    let length =
        i32::try_from(payload.len()).map_err(|_| EncodingError::InvalidSize(payload.len()))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Parse the size prefix of a frame.
///
/// Returns the payload length that follows the header.
///
/// # Errors
/// - [`DecodingError::InsufficientData`] if fewer than four bytes are available
/// - [`DecodingError::InvalidFrameSize`] if the length is negative or larger
///   than [`MAX_RESPONSE_SIZE`]
pub fn parse_frame_header(data: &[u8]) -> Result<usize, DecodingError> {
    let Some(header) = data.first_chunk::<FRAME_HEADER_SIZE>() else {
        return Err(DecodingError::insufficient(FRAME_HEADER_SIZE, data.len()));
    };

    let length = i32::from_be_bytes(*header);
    match usize::try_from(length) {
        Ok(length) if length <= MAX_RESPONSE_SIZE => Ok(length),
        _ => Err(DecodingError::InvalidFrameSize(i64::from(length))),
    }
}

/// Split one complete frame off the front of `data`.
///
/// Returns `Ok(None)` if more bytes are needed, otherwise the payload and
/// the remaining bytes.
pub fn split_frame(data: &[u8]) -> Result<Option<(&[u8], &[u8])>, DecodingError> {
    if data.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    let length = parse_frame_header(data)?;
    let frame_size = FRAME_HEADER_SIZE + length;
    if data.len() < frame_size {
        return Ok(None);
    }

    let (frame, rest) = data.split_at(frame_size);
    Ok(Some((&frame[FRAME_HEADER_SIZE..], rest)))
}
