//! Encode/decode dispatch.
//!
//! Message types implement [`Encoder`] and [`Decoder`] (or
//! [`VersionedDecoder`]) in terms of the primitive cursors; the drivers here
//! turn them into and out of bytes:
//!
//! - [`encode`] measures with a [`PrepEncoder`], checks the size against
//!   [`MAX_REQUEST_SIZE`], then fills a [`RealEncoder`] of exactly that size.
//! - [`decode`] and [`versioned_decode`] run a [`RealDecoder`] over the
//!   input and require that every byte was consumed.
//!
//! # Example
//!
//! ```
//! use kwire::{Decoder, DecodingError, Encoder, EncodingError, Metrics};
//! use kwire::{PacketDecoder, PacketEncoder, decode, encode};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Heartbeat {
//!     generation: i32,
//! }
//!
//! impl Encoder for Heartbeat {
//!     fn encode(&self, pe: &mut dyn PacketEncoder) -> Result<(), EncodingError> {
//!         pe.put_i32(self.generation)
//!     }
//! }
//!
//! impl Decoder for Heartbeat {
//!     fn decode(&mut self, pd: &mut dyn PacketDecoder) -> Result<(), DecodingError> {
//!         self.generation = pd.get_i32()?;
//!         Ok(())
//!     }
//! }
//!
//! let metrics = Metrics::noop();
//! let bytes = encode(Some(&Heartbeat { generation: 42 }), &metrics).unwrap();
//! assert_eq!(&bytes[..], &[0, 0, 0, 42]);
//!
//! let mut decoded = Heartbeat::default();
//! decode(Some(&bytes[..]), &mut decoded, &metrics).unwrap();
//! assert_eq!(decoded.generation, 42);
//! ```

use bytes::Bytes;
use kwire_core::{DecodingError, EncodingError, MAX_REQUEST_SIZE, Metrics};

use crate::decoder::{PacketDecoder, RealDecoder};
use crate::encoder::{PacketEncoder, PrepEncoder, RealEncoder};

/// A value that can fill itself into an encode cursor.
///
/// `encode` runs twice per [`encode`](fn@encode) call, once measuring and
/// once writing. It must depend only on `self` and write the same bytes
/// both times.
pub trait Encoder {
    fn encode(&self, pe: &mut dyn PacketEncoder) -> Result<(), EncodingError>;
}

/// An [`Encoder`] that also carries the version of its request header.
pub trait EncoderWithHeader: Encoder {
    fn header_version(&self) -> i16;
}

/// A value that can fill itself from a decode cursor.
pub trait Decoder {
    fn decode(&mut self, pd: &mut dyn PacketDecoder) -> Result<(), DecodingError>;
}

/// A value whose layout depends on the protocol version.
pub trait VersionedDecoder {
    fn decode_version(
        &mut self,
        pd: &mut dyn PacketDecoder,
        version: i16,
    ) -> Result<(), DecodingError>;
}

/// Encode `message` into a buffer of exactly its encoded size.
///
/// `None` encodes to empty bytes. The handle is attached to the writing
/// pass only.
///
/// # Errors
/// - any error raised by the message, unchanged
/// - [`EncodingError::InvalidSize`] if the measured size exceeds
///   [`MAX_REQUEST_SIZE`]; nothing is allocated
/// - [`EncodingError::SizeMismatch`] if the two passes disagree
pub fn encode<E>(message: Option<&E>, metrics: &Metrics) -> Result<Bytes, EncodingError>
where
    E: Encoder + ?Sized,
{
    let Some(message) = message else {
        return Ok(Bytes::new());
    };

    let mut prep = PrepEncoder::new();
    message.encode(&mut prep)?;
    let length = prep.finish()?;

    if length > MAX_REQUEST_SIZE {
        return Err(EncodingError::InvalidSize(length));
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(length, "measured message");

    let mut real = RealEncoder::new(length, metrics.clone());
    message.encode(&mut real)?;
    real.finish()
}

/// Fill `message` from `buf`.
///
/// `None` is a no-op and leaves `message` untouched. On error `message`
/// may be partially filled and must be discarded.
///
/// # Errors
/// - any error raised by the message or the cursor, unchanged
/// - [`DecodingError::UnbalancedPush`] if the message left a pushed field
///   open
/// - [`DecodingError::InvalidLength`] if bytes remain after the message
///   finished decoding
pub fn decode<D>(
    buf: Option<&[u8]>,
    message: &mut D,
    metrics: &Metrics,
) -> Result<(), DecodingError>
where
    D: Decoder + ?Sized,
{
    let Some(buf) = buf else {
        return Ok(());
    };

    let mut helper = RealDecoder::new(buf, metrics.clone());
    message.decode(&mut helper)?;
    ensure_consumed(&helper)
}

/// Fill `message` from `buf` using the layout of `version`.
///
/// Same contract as [`decode`].
pub fn versioned_decode<D>(
    buf: Option<&[u8]>,
    message: &mut D,
    version: i16,
    metrics: &Metrics,
) -> Result<(), DecodingError>
where
    D: VersionedDecoder + ?Sized,
{
    let Some(buf) = buf else {
        return Ok(());
    };

    let mut helper = RealDecoder::new(buf, metrics.clone());
    message.decode_version(&mut helper, version)?;
    ensure_consumed(&helper)
}

fn ensure_consumed(helper: &RealDecoder<'_>) -> Result<(), DecodingError> {
    #[cfg(feature = "tracing")]
    tracing::trace!(
        offset = helper.offset(),
        length = helper.len(),
        "decoded message"
    );

    helper.finish()
}
