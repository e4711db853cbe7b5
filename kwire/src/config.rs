//! Startup selection of the instrumentation handle.
//!
//! [`MetricsConfig`] is resolved once into a [`Metrics`] handle that is then
//! passed to every [`encode`](crate::encode) and [`decode`](crate::decode)
//! call. Turning metrics off yields a handle backed by no-op instruments,
//! so calling code never changes shape.

use kwire_core::{BrokerIdentity, KeyValue, Meter, Metrics, broker_attributes};

/// Default configuration values.
pub mod defaults {
    /// Metrics are recorded unless explicitly disabled.
    pub const ENABLED: bool = true;
}

/// Configuration for the instrumentation handle.
///
/// # Example
///
/// ```
/// use kwire::MetricsConfig;
/// use kwire_core::{BrokerIdentity, InMemoryMeter, KeyValue, names};
///
/// let meter = InMemoryMeter::new();
/// let metrics = MetricsConfig::new()
///     .broker(BrokerIdentity::new(3, "kafka-3:9092"))
///     .attribute(KeyValue::string("client_id", "ingest"))
///     .build(&meter);
///
/// metrics.requests().add(1, metrics.attributes());
/// assert_eq!(meter.sum(names::REQUESTS), 1);
/// assert_eq!(metrics.attributes().len(), 4);
/// ```
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Record through the supplied meter. When false, [`build`](Self::build)
    /// ignores the meter.
    pub enabled: bool,

    /// Broker whose identity is bound to every measurement.
    pub broker: Option<BrokerIdentity>,

    /// Extra attributes bound after the broker attributes.
    pub attributes: Vec<KeyValue>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::ENABLED,
            broker: None,
            attributes: Vec::new(),
        }
    }
}

impl MetricsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration whose handle records nothing.
    pub fn disabled() -> Self {
        Self::new().enabled(false)
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn broker(mut self, broker: BrokerIdentity) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Append one extra attribute.
    pub fn attribute(mut self, attribute: KeyValue) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Append several extra attributes.
    pub fn attributes<I>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = KeyValue>,
    {
        self.attributes.extend(attributes);
        self
    }

    /// Resolve into a handle.
    ///
    /// Returns [`Metrics::noop`] when disabled. Otherwise the handle's
    /// instruments come from `meter`, with the broker attributes followed
    /// by the extra attributes bound.
    pub fn build(&self, meter: &dyn Meter) -> Metrics {
        if !self.enabled {
            return Metrics::noop();
        }

        let broker = self.broker.iter().flat_map(broker_attributes);
        Metrics::new(meter).with_attributes(broker.chain(self.attributes.iter().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kwire_core::{InMemoryMeter, names};

    #[test]
    fn test_default_is_enabled() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert!(config.broker.is_none());
        assert!(config.attributes.is_empty());
    }

    #[test]
    fn test_build_binds_broker_then_extras() {
        let meter = InMemoryMeter::new();
        let metrics = MetricsConfig::new()
            .attribute(KeyValue::string("client_id", "c1"))
            .broker(BrokerIdentity::new(1, "b1:9092").rack("r1"))
            .build(&meter);

        let keys: Vec<_> = metrics.attributes().iter().map(|kv| kv.key).collect();
        assert_eq!(keys, ["broker_id", "broker_addr", "broker_rack", "client_id"]);
    }

    #[test]
    fn test_build_records_through_meter() {
        let meter = InMemoryMeter::new();
        let metrics = MetricsConfig::new().build(&meter);
        metrics.outgoing_bytes().add(128, metrics.attributes());
        assert_eq!(meter.sum(names::OUTGOING_BYTES), 128);
    }

    #[test]
    fn test_disabled_records_nothing() {
        let meter = InMemoryMeter::new();
        let metrics = MetricsConfig::disabled()
            .broker(BrokerIdentity::new(1, "b1:9092"))
            .build(&meter);

        metrics.outgoing_bytes().add(128, metrics.attributes());
        metrics.request_latency().record(5, metrics.attributes());
        assert!(meter.is_empty());
        assert!(metrics.attributes().is_empty());
    }
}
