//! Instrumentation seam.
//!
//! This module provides:
//! - [`Meter`]: the backend interface, creating named instruments
//! - [`Int64Counter`], [`Int64UpDownCounter`], [`Int64Histogram`]: instrument traits
//! - [`Metrics`]: the handle threaded through every encode/decode call
//! - [`NoopMeter`] and [`InMemoryMeter`]: built-in backends
//!
//! A [`Metrics`] handle is built once at startup and never mutated. Both the
//! real and the no-op variant expose the same instruments, so calling code
//! never branches on whether instrumentation is enabled.
//!
//! # Example
//!
//! ```
//! use kwire_core::{BrokerIdentity, InMemoryMeter, Metrics, broker_attributes, names};
//!
//! let meter = InMemoryMeter::new();
//! let broker = BrokerIdentity::new(1, "localhost:9092");
//! let metrics = Metrics::new(&meter).with_attributes(broker_attributes(&broker));
//!
//! metrics
//!     .record_sends()
//!     .add(3, &metrics.with_topic_partition("events", 0));
//! assert_eq!(meter.sum(names::RECORD_SENDS), 3);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Instrument names.
pub mod names {
    /// Spelled as existing dashboards expect it.
    pub const CONSUMER_FETCHES: &str = "consumer_fetchs_total";
    pub const INCOMING_BYTES: &str = "incoming_bytes_total";
    pub const REQUESTS: &str = "requests_total";
    pub const REQUEST_SIZE: &str = "request_size";
    pub const REQUEST_LATENCY: &str = "request_latency_in_ms";
    pub const OUTGOING_BYTES: &str = "outgoing_bytes_total";
    pub const RESPONSES: &str = "responses_total";
    pub const RESPONSE_SIZE: &str = "response_size";
    pub const REQUESTS_IN_FLIGHT: &str = "requests_in_flight";
    pub const PROTOCOL_REQUESTS: &str = "protocol_requests_total";
    pub const THROTTLE_TIME: &str = "throttle_time_in_ms";
    pub const BATCH_SIZE: &str = "batch_size";
    pub const COMPRESSION_RATIO: &str = "compression_ratio";
    pub const RECORD_SENDS: &str = "record_sends";
    pub const RECORDS_PER_REQUEST: &str = "records_per_request";
    pub const CONSUMER_FETCH_RESPONSE_SIZE: &str = "consumer_fetch_response_size";
}

/// An attribute value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    I64(i64),
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I64(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
        }
    }
}

/// A single metric attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyValue {
    pub key: &'static str,
    pub value: Value,
}

impl KeyValue {
    /// Create an integer attribute.
    pub fn i64(key: &'static str, value: i64) -> Self {
        Self {
            key,
            value: Value::I64(value),
        }
    }

    /// Create a string attribute.
    pub fn string<S: Into<String>>(key: &'static str, value: S) -> Self {
        Self {
            key,
            value: Value::String(value.into()),
        }
    }
}

/// Monotonic counter.
pub trait Int64Counter: Send + Sync + 'static {
    /// Add a non-negative increment.
    fn add(&self, value: i64, attributes: &[KeyValue]);
}

/// Counter that may go up and down.
pub trait Int64UpDownCounter: Send + Sync + 'static {
    fn add(&self, value: i64, attributes: &[KeyValue]);
}

/// Distribution of recorded values.
pub trait Int64Histogram: Send + Sync + 'static {
    fn record(&self, value: i64, attributes: &[KeyValue]);
}

/// Metrics backend.
///
/// Implementations must tolerate concurrent use of the instruments they
/// hand out; the handle is shared by every in-flight encode/decode call.
pub trait Meter: Send + Sync {
    fn i64_counter(&self, name: &'static str) -> Arc<dyn Int64Counter>;

    fn i64_up_down_counter(&self, name: &'static str) -> Arc<dyn Int64UpDownCounter>;

    /// `unit` is a UCUM unit string such as `"ms"`, or `None`.
    fn i64_histogram(&self, name: &'static str, unit: Option<&'static str>)
    -> Arc<dyn Int64Histogram>;
}

/// Instrument that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

impl Int64Counter for Noop {
    fn add(&self, _value: i64, _attributes: &[KeyValue]) {}
}

impl Int64UpDownCounter for Noop {
    fn add(&self, _value: i64, _attributes: &[KeyValue]) {}
}

impl Int64Histogram for Noop {
    fn record(&self, _value: i64, _attributes: &[KeyValue]) {}
}

/// Backend whose instruments are all [`Noop`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMeter;

impl Meter for NoopMeter {
    fn i64_counter(&self, _name: &'static str) -> Arc<dyn Int64Counter> {
        Arc::new(Noop)
    }

    fn i64_up_down_counter(&self, _name: &'static str) -> Arc<dyn Int64UpDownCounter> {
        Arc::new(Noop)
    }

    fn i64_histogram(
        &self,
        _name: &'static str,
        _unit: Option<&'static str>,
    ) -> Arc<dyn Int64Histogram> {
        Arc::new(Noop)
    }
}

/// Identity of the broker a handle reports for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerIdentity {
    pub id: i32,
    pub addr: String,
    pub rack: Option<String>,
}

impl BrokerIdentity {
    pub fn new<S: Into<String>>(id: i32, addr: S) -> Self {
        Self {
            id,
            addr: addr.into(),
            rack: None,
        }
    }

    pub fn rack<S: Into<String>>(mut self, rack: S) -> Self {
        self.rack = Some(rack.into());
        self
    }
}

/// Attributes identifying a broker: `broker_id`, `broker_addr`, `broker_rack`.
pub fn broker_attributes(broker: &BrokerIdentity) -> Vec<KeyValue> {
    vec![
        KeyValue::i64("broker_id", i64::from(broker.id)),
        KeyValue::string("broker_addr", broker.addr.as_str()),
        KeyValue::string("broker_rack", broker.rack.as_deref().unwrap_or("")),
    ]
}

pub fn topic_attributes(topic: &str) -> Vec<KeyValue> {
    vec![KeyValue::string("topic", topic)]
}

pub fn topic_partition_attributes(topic: &str, partition_id: i32) -> Vec<KeyValue> {
    let mut attributes = topic_attributes(topic);
    attributes.push(KeyValue::i64("partition_id", i64::from(partition_id)));
    attributes
}

struct Instruments {
    consumer_fetches: Arc<dyn Int64Counter>,
    incoming_bytes: Arc<dyn Int64Counter>,
    requests: Arc<dyn Int64Counter>,
    request_size: Arc<dyn Int64Histogram>,
    request_latency: Arc<dyn Int64Histogram>,
    outgoing_bytes: Arc<dyn Int64Counter>,
    responses: Arc<dyn Int64Counter>,
    response_size: Arc<dyn Int64Histogram>,
    requests_in_flight: Arc<dyn Int64UpDownCounter>,
    protocol_requests: Arc<dyn Int64Counter>,
    throttle_time: Arc<dyn Int64Histogram>,

    batch_size: Arc<dyn Int64Histogram>,
    compression_ratio: Arc<dyn Int64Histogram>,
    record_sends: Arc<dyn Int64Counter>,
    records_per_request: Arc<dyn Int64Histogram>,
    consumer_fetch_response_size: Arc<dyn Int64Histogram>,
}

impl Instruments {
    fn from_meter(meter: &dyn Meter) -> Self {
        Self {
            consumer_fetches: meter.i64_counter(names::CONSUMER_FETCHES),
            incoming_bytes: meter.i64_counter(names::INCOMING_BYTES),
            requests: meter.i64_counter(names::REQUESTS),
            request_size: meter.i64_histogram(names::REQUEST_SIZE, None),
            request_latency: meter.i64_histogram(names::REQUEST_LATENCY, Some("ms")),
            outgoing_bytes: meter.i64_counter(names::OUTGOING_BYTES),
            responses: meter.i64_counter(names::RESPONSES),
            response_size: meter.i64_histogram(names::RESPONSE_SIZE, None),
            requests_in_flight: meter.i64_up_down_counter(names::REQUESTS_IN_FLIGHT),
            protocol_requests: meter.i64_counter(names::PROTOCOL_REQUESTS),
            throttle_time: meter.i64_histogram(names::THROTTLE_TIME, Some("ms")),

            batch_size: meter.i64_histogram(names::BATCH_SIZE, None),
            compression_ratio: meter.i64_histogram(names::COMPRESSION_RATIO, None),
            record_sends: meter.i64_counter(names::RECORD_SENDS),
            records_per_request: meter.i64_histogram(names::RECORDS_PER_REQUEST, None),
            consumer_fetch_response_size: meter
                .i64_histogram(names::CONSUMER_FETCH_RESPONSE_SIZE, None),
        }
    }
}

/// Instrumentation handle.
///
/// Cloning is cheap: instruments and attributes are shared. A handle is
/// purely observational; swapping a real handle for [`Metrics::noop`] never
/// changes what an encode or decode returns.
#[derive(Clone)]
pub struct Metrics {
    attributes: Arc<Vec<KeyValue>>,
    instruments: Arc<Instruments>,
}

impl Metrics {
    /// Create a handle bound to `meter`.
    pub fn new(meter: &dyn Meter) -> Self {
        Self {
            attributes: Arc::new(Vec::new()),
            instruments: Arc::new(Instruments::from_meter(meter)),
        }
    }

    /// Create a handle whose instruments drop everything.
    pub fn noop() -> Self {
        Self::new(&NoopMeter)
    }

    /// Return a new handle sharing these instruments, with `attributes`
    /// appended to the fixed attribute list.
    pub fn with_attributes<I>(&self, attributes: I) -> Self
    where
        I: IntoIterator<Item = KeyValue>,
    {
        let mut merged = self.attributes.as_ref().clone();
        merged.extend(attributes);
        Self {
            attributes: Arc::new(merged),
            instruments: Arc::clone(&self.instruments),
        }
    }

    /// The fixed attributes carried by this handle.
    pub fn attributes(&self) -> &[KeyValue] {
        &self.attributes
    }

    /// `[topic]` followed by this handle's fixed attributes.
    pub fn with_topic(&self, topic: &str) -> Vec<KeyValue> {
        let mut attributes = topic_attributes(topic);
        attributes.extend(self.attributes.iter().cloned());
        attributes
    }

    /// `[topic, partition_id]` followed by this handle's fixed attributes.
    pub fn with_topic_partition(&self, topic: &str, partition_id: i32) -> Vec<KeyValue> {
        let mut attributes = topic_partition_attributes(topic, partition_id);
        attributes.extend(self.attributes.iter().cloned());
        attributes
    }

    pub fn consumer_fetches(&self) -> &dyn Int64Counter {
        self.instruments.consumer_fetches.as_ref()
    }

    pub fn incoming_bytes(&self) -> &dyn Int64Counter {
        self.instruments.incoming_bytes.as_ref()
    }

    pub fn requests(&self) -> &dyn Int64Counter {
        self.instruments.requests.as_ref()
    }

    pub fn request_size(&self) -> &dyn Int64Histogram {
        self.instruments.request_size.as_ref()
    }

    pub fn request_latency(&self) -> &dyn Int64Histogram {
        self.instruments.request_latency.as_ref()
    }

    pub fn outgoing_bytes(&self) -> &dyn Int64Counter {
        self.instruments.outgoing_bytes.as_ref()
    }

    pub fn responses(&self) -> &dyn Int64Counter {
        self.instruments.responses.as_ref()
    }

    pub fn response_size(&self) -> &dyn Int64Histogram {
        self.instruments.response_size.as_ref()
    }

    pub fn requests_in_flight(&self) -> &dyn Int64UpDownCounter {
        self.instruments.requests_in_flight.as_ref()
    }

    pub fn protocol_requests(&self) -> &dyn Int64Counter {
        self.instruments.protocol_requests.as_ref()
    }

    pub fn throttle_time(&self) -> &dyn Int64Histogram {
        self.instruments.throttle_time.as_ref()
    }

    pub fn batch_size(&self) -> &dyn Int64Histogram {
        self.instruments.batch_size.as_ref()
    }

    /// Compression ratio, recorded as `uncompressed * 100 / compressed`.
    pub fn compression_ratio(&self) -> &dyn Int64Histogram {
        self.instruments.compression_ratio.as_ref()
    }

    pub fn record_sends(&self) -> &dyn Int64Counter {
        self.instruments.record_sends.as_ref()
    }

    pub fn records_per_request(&self) -> &dyn Int64Histogram {
        self.instruments.records_per_request.as_ref()
    }

    pub fn consumer_fetch_response_size(&self) -> &dyn Int64Histogram {
        self.instruments.consumer_fetch_response_size.as_ref()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// InMemoryMeter
// ============================================================================

/// A single recorded value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Measurement {
    pub value: i64,
    pub attributes: Vec<KeyValue>,
}

type Store = Arc<Mutex<HashMap<&'static str, Vec<Measurement>>>>;

/// Backend that keeps every measurement in memory.
///
/// Counters, up/down counters and histograms all append to the same
/// per-name log; [`InMemoryMeter::sum`] and [`InMemoryMeter::measurements`]
/// read it back.
#[derive(Clone, Debug, Default)]
pub struct InMemoryMeter {
    store: Store,
}

struct Recorder {
    name: &'static str,
    store: Store,
}

impl Recorder {
    fn push(&self, value: i64, attributes: &[KeyValue]) {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.entry(self.name).or_default().push(Measurement {
            value,
            attributes: attributes.to_vec(),
        });
    }
}

impl Int64Counter for Recorder {
    fn add(&self, value: i64, attributes: &[KeyValue]) {
        self.push(value, attributes);
    }
}

impl Int64UpDownCounter for Recorder {
    fn add(&self, value: i64, attributes: &[KeyValue]) {
        self.push(value, attributes);
    }
}

impl Int64Histogram for Recorder {
    fn record(&self, value: i64, attributes: &[KeyValue]) {
        self.push(value, attributes);
    }
}

impl InMemoryMeter {
    pub fn new() -> Self {
        Self::default()
    }

    fn recorder(&self, name: &'static str) -> Recorder {
        Recorder {
            name,
            store: Arc::clone(&self.store),
        }
    }

    /// All measurements recorded under `name`, oldest first.
    pub fn measurements(&self, name: &str) -> Vec<Measurement> {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.get(name).cloned().unwrap_or_default()
    }

    /// Sum of all values recorded under `name`.
    pub fn sum(&self, name: &str) -> i64 {
        self.measurements(name).iter().map(|m| m.value).sum()
    }

    /// Returns true if nothing has been recorded under any name.
    pub fn is_empty(&self) -> bool {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.values().all(Vec::is_empty)
    }
}

impl Meter for InMemoryMeter {
    fn i64_counter(&self, name: &'static str) -> Arc<dyn Int64Counter> {
        Arc::new(self.recorder(name))
    }

    fn i64_up_down_counter(&self, name: &'static str) -> Arc<dyn Int64UpDownCounter> {
        Arc::new(self.recorder(name))
    }

    fn i64_histogram(
        &self,
        name: &'static str,
        _unit: Option<&'static str>,
    ) -> Arc<dyn Int64Histogram> {
        Arc::new(self.recorder(name))
    }
}
