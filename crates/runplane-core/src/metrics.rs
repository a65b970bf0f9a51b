//! Pluggable metrics registry (J, spec §4.9).
//!
//! Call sites use the free functions [`increment`], [`gauge`], [`histogram`]
//! and [`timer`] without caring what backend is wired up. By default
//! metrics are emitted as `tracing` events; [`set_global`] swaps in another
//! [`MetricsSink`] (e.g. a real Prometheus/statsd exporter) once at process
//! start.

use std::sync::OnceLock;

/// A destination for metric observations.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, name: &str, value: u64, tags: &[(&str, &str)]);
    fn gauge(&self, name: &str, value: f64, tags: &[(&str, &str)]);
    fn histogram(&self, name: &str, value: f64, tags: &[(&str, &str)]);
    fn timer(&self, name: &str, duration_ms: f64, tags: &[(&str, &str)]);
}

/// Default sink: emits each observation as a `tracing::trace!` event.
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn increment(&self, name: &str, value: u64, tags: &[(&str, &str)]) {
        tracing::trace!(metric = %name, kind = "counter", value, ?tags);
    }

    fn gauge(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        tracing::trace!(metric = %name, kind = "gauge", value, ?tags);
    }

    fn histogram(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        tracing::trace!(metric = %name, kind = "histogram", value, ?tags);
    }

    fn timer(&self, name: &str, duration_ms: f64, tags: &[(&str, &str)]) {
        tracing::trace!(metric = %name, kind = "timer", duration_ms, ?tags);
    }
}

static GLOBAL_SINK: OnceLock<Box<dyn MetricsSink>> = OnceLock::new();

/// Install a non-default sink. Must be called before the first metric is
/// recorded; later calls are ignored (first writer wins, matching
/// `OnceLock` semantics).
pub fn set_global(sink: Box<dyn MetricsSink>) {
    let _ = GLOBAL_SINK.set(sink);
}

fn sink() -> &'static dyn MetricsSink {
    GLOBAL_SINK.get_or_init(|| Box::new(TracingMetricsSink)).as_ref()
}

pub fn increment(name: &str, value: u64, tags: &[(&str, &str)]) {
    sink().increment(name, value, tags);
}

pub fn gauge(name: &str, value: f64, tags: &[(&str, &str)]) {
    sink().gauge(name, value, tags);
}

pub fn histogram(name: &str, value: f64, tags: &[(&str, &str)]) {
    sink().histogram(name, value, tags);
}

pub fn timer(name: &str, duration_ms: f64, tags: &[(&str, &str)]) {
    sink().timer(name, duration_ms, tags);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct CountingSink {
        calls: Arc<AtomicU64>,
    }

    impl MetricsSink for CountingSink {
        fn increment(&self, _name: &str, _value: u64, _tags: &[(&str, &str)]) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
        fn gauge(&self, _name: &str, _value: f64, _tags: &[(&str, &str)]) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
        fn histogram(&self, _name: &str, _value: f64, _tags: &[(&str, &str)]) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
        fn timer(&self, _name: &str, _duration_ms: f64, _tags: &[(&str, &str)]) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn default_sink_does_not_panic_on_any_metric_kind() {
        increment("runplane.runs_created", 1, &[("tenant", "acme")]);
        gauge("runplane.runs_in_flight", 3.0, &[]);
        histogram("runplane.triage_score", 7.0, &[]);
        timer("runplane.apply_duration_ms", 42.0, &[]);
    }

    #[test]
    fn custom_sink_struct_implements_all_four_kinds() {
        let calls = Arc::new(AtomicU64::new(0));
        let custom = CountingSink { calls: calls.clone() };
        custom.increment("x", 1, &[]);
        custom.gauge("x", 1.0, &[]);
        custom.histogram("x", 1.0, &[]);
        custom.timer("x", 1.0, &[]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
