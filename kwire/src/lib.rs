//! Size-safe encode/decode dispatch for Kafka-style binary wire protocols.
//!
//! This crate turns message types into bytes and back:
//!
//! - [`Encoder`], [`Decoder`], [`VersionedDecoder`]: what a message implements
//! - [`PacketEncoder`], [`PacketDecoder`]: the primitive cursors it writes to and reads from
//! - [`encode`], [`decode`], [`versioned_decode`]: the drivers
//!
//! Encoding is two passes: a [`PrepEncoder`] measures, the size is checked
//! against [`MAX_REQUEST_SIZE`], and a [`RealEncoder`] fills a buffer of
//! exactly that size. Decoding fails unless the message consumed every input
//! byte.
//!
//! Every driver takes a [`Metrics`] handle. Build it once at startup with
//! [`MetricsConfig`]; a disabled config gives a handle whose instruments do
//! nothing.
//!
//! ## Features
//!
//! - `tracing` (default): TRACE events from the drivers and the
//!   [`TracingMeter`] backend
//! - `opentelemetry`: the `OpenTelemetryMeter` backend over an
//!   `opentelemetry::metrics::Meter`
//! - `compression-gzip`, `compression-zstd`, `compression-full`: codecs for
//!   [`PacketEncoder::put_compressed_bytes`]
//!
//! ## Example
//!
//! ```
//! use kwire::{Decoder, DecodingError, Encoder, EncodingError, Metrics, MetricsConfig};
//! use kwire::{InMemoryMeter, PacketDecoder, PacketEncoder, PushField, decode, encode};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Produce {
//!     topic: String,
//!     payload: Option<Vec<u8>>,
//! }
//!
//! impl Encoder for Produce {
//!     fn encode(&self, pe: &mut dyn PacketEncoder) -> Result<(), EncodingError> {
//!         pe.put_string(&self.topic)?;
//!         pe.push(PushField::Crc32)?;
//!         pe.put_bytes(self.payload.as_deref())?;
//!         pe.pop()
//!     }
//! }
//!
//! impl Decoder for Produce {
//!     fn decode(&mut self, pd: &mut dyn PacketDecoder) -> Result<(), DecodingError> {
//!         self.topic = pd.get_string()?;
//!         pd.push(PushField::Crc32)?;
//!         self.payload = pd.get_bytes()?;
//!         pd.pop()
//!     }
//! }
//!
//! let meter = InMemoryMeter::new();
//! let metrics: Metrics = MetricsConfig::new().build(&meter);
//!
//! let message = Produce { topic: "events".into(), payload: Some(b"hello".to_vec()) };
//! let bytes = encode(Some(&message), &metrics)?;
//!
//! let mut decoded = Produce::default();
//! decode(Some(&bytes[..]), &mut decoded, &metrics)?;
//! assert_eq!(decoded, message);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod decoder;
mod dispatch;
mod encoder;
#[cfg(feature = "opentelemetry")]
mod otel_meter;
mod push;
#[cfg(feature = "tracing")]
mod tracing_meter;
mod varint;

pub use config::{MetricsConfig, defaults};
pub use decoder::{PacketDecoder, RealDecoder};
pub use dispatch::{
    Decoder, Encoder, EncoderWithHeader, VersionedDecoder, decode, encode, versioned_decode,
};
pub use encoder::{PacketEncoder, PrepEncoder, RealEncoder};
#[cfg(feature = "opentelemetry")]
pub use otel_meter::OpenTelemetryMeter;
pub use push::PushField;
#[cfg(feature = "tracing")]
pub use tracing_meter::{METRICS_TARGET, TracingMeter};

pub use kwire_core::{
    BoxedCodec, BrokerIdentity, Codec, CompressionCodec, CompressionConfig, CompressionLevel,
    DecodingError, EncodingError, FRAME_HEADER_SIZE, InMemoryMeter, Int64Counter,
    Int64Histogram, Int64UpDownCounter, KeyValue, MAX_REQUEST_SIZE, MAX_RESPONSE_SIZE,
    Measurement, Meter, Metrics, NoopMeter, Value, broker_attributes, names,
    parse_frame_header, split_frame, topic_attributes, topic_partition_attributes, wrap_frame,
};
