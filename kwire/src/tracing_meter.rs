//! Metrics backend that forwards every measurement as a `tracing` event.

use std::fmt;
use std::sync::Arc;

use kwire_core::{Int64Counter, Int64Histogram, Int64UpDownCounter, KeyValue, Meter};

/// Target of the events emitted by [`TracingMeter`].
pub const METRICS_TARGET: &str = "kwire::metrics";

/// [`Meter`] whose instruments emit a DEBUG event on the
/// `kwire::metrics` target for every add or record.
///
/// Events carry `metric`, `value` and `attributes` fields, with attributes
/// rendered as `key=value` pairs separated by commas.
///
/// ```
/// use kwire::{MetricsConfig, TracingMeter};
///
/// let metrics = MetricsConfig::new().build(&TracingMeter);
/// metrics.requests().add(1, metrics.attributes());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMeter;

#[derive(Debug)]
struct Instrument {
    name: &'static str,
    unit: Option<&'static str>,
}

impl Instrument {
    fn emit(&self, value: i64, attributes: &[KeyValue]) {
        tracing::debug!(
            target: METRICS_TARGET,
            metric = self.name,
            unit = self.unit,
            value,
            attributes = %Attributes(attributes),
        );
    }
}

impl Int64Counter for Instrument {
    fn add(&self, value: i64, attributes: &[KeyValue]) {
        self.emit(value, attributes);
    }
}

impl Int64UpDownCounter for Instrument {
    fn add(&self, value: i64, attributes: &[KeyValue]) {
        self.emit(value, attributes);
    }
}

impl Int64Histogram for Instrument {
    fn record(&self, value: i64, attributes: &[KeyValue]) {
        self.emit(value, attributes);
    }
}

impl Meter for TracingMeter {
    fn i64_counter(&self, name: &'static str) -> Arc<dyn Int64Counter> {
        Arc::new(Instrument { name, unit: None })
    }

    fn i64_up_down_counter(&self, name: &'static str) -> Arc<dyn Int64UpDownCounter> {
        Arc::new(Instrument { name, unit: None })
    }

    fn i64_histogram(
        &self,
        name: &'static str,
        unit: Option<&'static str>,
    ) -> Arc<dyn Int64Histogram> {
        Arc::new(Instrument { name, unit })
    }
}

struct Attributes<'a>(&'a [KeyValue]);

impl fmt::Display for Attributes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, kv) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", kv.key, kv.value)?;
        }
        Ok(())
    }
}
