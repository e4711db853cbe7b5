//! Metrics backend over an OpenTelemetry meter.

use std::fmt;
use std::sync::Arc;

use kwire_core::{Int64Counter, Int64Histogram, Int64UpDownCounter, KeyValue, Meter, Value};
use opentelemetry::metrics::{Counter, Histogram, UpDownCounter};

/// [`Meter`] that creates its instruments on an
/// [`opentelemetry::metrics::Meter`].
///
/// Counters and histograms are unsigned in OpenTelemetry, so negative
/// adds and records are dropped. Up/down counters take any value.
///
/// ```
/// use kwire::{MetricsConfig, OpenTelemetryMeter};
///
/// let meter = OpenTelemetryMeter::new(opentelemetry::global::meter("kwire"));
/// let metrics = MetricsConfig::new().build(&meter);
/// metrics.requests().add(1, metrics.attributes());
/// ```
#[derive(Clone)]
pub struct OpenTelemetryMeter {
    meter: opentelemetry::metrics::Meter,
}

impl fmt::Debug for OpenTelemetryMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenTelemetryMeter").finish_non_exhaustive()
    }
}

impl OpenTelemetryMeter {
    pub fn new(meter: opentelemetry::metrics::Meter) -> Self {
        Self { meter }
    }
}

impl From<opentelemetry::metrics::Meter> for OpenTelemetryMeter {
    fn from(meter: opentelemetry::metrics::Meter) -> Self {
        Self::new(meter)
    }
}

fn convert(attributes: &[KeyValue]) -> Vec<opentelemetry::KeyValue> {
    attributes
        .iter()
        .map(|kv| match &kv.value {
            Value::I64(v) => opentelemetry::KeyValue::new(kv.key, *v),
            Value::String(v) => opentelemetry::KeyValue::new(kv.key, v.clone()),
        })
        .collect()
}

struct OtelCounter(Counter<u64>);

impl Int64Counter for OtelCounter {
    fn add(&self, value: i64, attributes: &[KeyValue]) {
        if let Ok(value) = u64::try_from(value) {
            self.0.add(value, &convert(attributes));
        }
    }
}

struct OtelUpDownCounter(UpDownCounter<i64>);

impl Int64UpDownCounter for OtelUpDownCounter {
    fn add(&self, value: i64, attributes: &[KeyValue]) {
        self.0.add(value, &convert(attributes));
    }
}

struct OtelHistogram(Histogram<u64>);

impl Int64Histogram for OtelHistogram {
    fn record(&self, value: i64, attributes: &[KeyValue]) {
        if let Ok(value) = u64::try_from(value) {
            self.0.record(value, &convert(attributes));
        }
    }
}

impl Meter for OpenTelemetryMeter {
    fn i64_counter(&self, name: &'static str) -> Arc<dyn Int64Counter> {
        Arc::new(OtelCounter(self.meter.u64_counter(name).build()))
    }

    fn i64_up_down_counter(&self, name: &'static str) -> Arc<dyn Int64UpDownCounter> {
        Arc::new(OtelUpDownCounter(self.meter.i64_up_down_counter(name).build()))
    }

    fn i64_histogram(
        &self,
        name: &'static str,
        unit: Option<&'static str>,
    ) -> Arc<dyn Int64Histogram> {
        let builder = self.meter.u64_histogram(name);
        let histogram = match unit {
            Some(unit) => builder.with_unit(unit).build(),
            None => builder.build(),
        };
        Arc::new(OtelHistogram(histogram))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use kwire_core::{BrokerIdentity, Metrics, broker_attributes, names};
    use opentelemetry::metrics::MeterProvider;
    use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};

    use crate::{Encoder, EncodingError, PacketEncoder, encode};

    struct Ping;

    impl Encoder for Ping {
        fn encode(&self, pe: &mut dyn PacketEncoder) -> Result<(), EncodingError> {
            pe.put_i32(7)
        }
    }

    #[test]
    fn test_convert_attributes() {
        let attributes = broker_attributes(&BrokerIdentity::new(3, "b:9092").rack("r1"));
        let converted: Vec<(String, String)> = convert(&attributes)
            .iter()
            .map(|kv| (kv.key.as_str().to_string(), kv.value.to_string()))
            .collect();
        assert_eq!(
            converted,
            vec![
                ("broker_id".to_string(), "3".to_string()),
                ("broker_addr".to_string(), "b:9092".to_string()),
                ("broker_rack".to_string(), "r1".to_string()),
            ]
        );
        assert_eq!(
            convert(&attributes)[0].value,
            opentelemetry::Value::I64(3)
        );
    }

    #[test]
    fn test_global_noop_meter_accepts_everything() {
        let meter = OpenTelemetryMeter::from(opentelemetry::global::meter("kwire"));
        let metrics = Metrics::new(&meter);
        metrics.requests().add(1, metrics.attributes());
        metrics.requests().add(-1, metrics.attributes());
        metrics.requests_in_flight().add(-1, &[]);
        metrics.request_latency().record(-5, &metrics.with_topic("t"));

        let bytes = encode(Some(&Ping), &metrics).unwrap();
        assert_eq!(&bytes[..], &[0, 0, 0, 7]);
    }

    #[test]
    fn test_sdk_exports_instruments() {
        let exporter = InMemoryMetricExporter::default();
        let reader = PeriodicReader::builder(exporter.clone()).build();
        let provider = SdkMeterProvider::builder().with_reader(reader).build();

        let meter = OpenTelemetryMeter::new(provider.meter("kwire"));
        let metrics = Metrics::new(&meter);
        metrics.consumer_fetches().add(2, metrics.attributes());
        metrics.requests_in_flight().add(1, &[]);
        metrics.request_latency().record(12, &[]);
        metrics.batch_size().record(512, &metrics.with_topic_partition("events", 0));

        provider.force_flush().unwrap();
        let exported = exporter.get_finished_metrics().unwrap();

        let mut units = HashMap::new();
        for resource in &exported {
            for scope in resource.scope_metrics() {
                for metric in scope.metrics() {
                    units.insert(metric.name().to_string(), metric.unit().to_string());
                }
            }
        }

        assert_eq!(units.get(names::CONSUMER_FETCHES).map(String::as_str), Some(""));
        assert_eq!(units.get(names::REQUESTS_IN_FLIGHT).map(String::as_str), Some(""));
        assert_eq!(units.get(names::REQUEST_LATENCY).map(String::as_str), Some("ms"));
        assert_eq!(units.get(names::BATCH_SIZE).map(String::as_str), Some(""));
    }
}
