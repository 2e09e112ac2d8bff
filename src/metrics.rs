//! Prometheus metrics collection for slbroker.
//!
//! Exposed on an HTTP endpoint (see [`crate::http`]). Every recorder is a
//! no-op until [`init`] has run, so library users and tests that never
//! initialize metrics pay nothing.
//!
//! - `slbroker_connections_active` - sessions currently running (gauge)
//! - `slbroker_connections_total` - sessions accepted (counter)
//! - `slbroker_messages_dispatched_total{event}` - messages handed to the dispatcher
//! - `slbroker_dispatch_duration_seconds{event}` - dispatch latency histogram
//! - `slbroker_dispatch_errors_total{event,error}` - handler errors by kind
//! - `slbroker_message_fanout` - recipients per channel broadcast (histogram)
//! - `slbroker_malformed_payloads_total` - undecodable or unparseable frames
//! - `slbroker_deliveries_dropped_total` - broadcasts not queued for a subscriber

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Gauges
// ========================================================================

/// Currently running sessions across all vhosts.
pub static CONNECTIONS_ACTIVE: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Counters
// ========================================================================

/// Sessions accepted since startup.
pub static CONNECTIONS_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Messages dispatched, by event name.
pub static MESSAGES_DISPATCHED: OnceLock<IntCounterVec> = OnceLock::new();

/// Handler errors by event and error kind.
pub static DISPATCH_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Frames that could not be decoded or parsed into a message.
pub static MALFORMED_PAYLOADS: OnceLock<IntCounter> = OnceLock::new();

/// Broadcast deliveries skipped because a subscriber queue was full or closed.
pub static DELIVERIES_DROPPED: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Dispatch latency by event name.
pub static DISPATCH_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Recipients per channel broadcast.
pub static MESSAGE_FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before metrics are scraped. Later calls
/// are harmless.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(CONNECTIONS_ACTIVE, IntGauge::new("slbroker_connections_active", "Sessions currently running"));
    register!(CONNECTIONS_TOTAL, IntCounter::new("slbroker_connections_total", "Sessions accepted"));
    register!(MESSAGES_DISPATCHED, IntCounterVec::new(Opts::new("slbroker_messages_dispatched_total", "Messages dispatched by event"), &["event"]));
    register!(DISPATCH_ERRORS, IntCounterVec::new(Opts::new("slbroker_dispatch_errors_total", "Dispatch errors by event and kind"), &["event", "error"]));
    register!(MALFORMED_PAYLOADS, IntCounter::new("slbroker_malformed_payloads_total", "Undecodable or unparseable frames"));
    register!(DELIVERIES_DROPPED, IntCounter::new("slbroker_deliveries_dropped_total", "Broadcast deliveries dropped due to backpressure"));
    register!(DISPATCH_LATENCY, HistogramVec::new(
        HistogramOpts::new("slbroker_dispatch_duration_seconds", "Dispatch latency by event")
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        &["event"]));
    register!(MESSAGE_FANOUT, Histogram::with_opts(
        HistogramOpts::new("slbroker_message_fanout", "Recipients per channel broadcast")
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Recorders
// ============================================================================

/// A session started.
#[inline]
pub fn connection_opened() {
    if let Some(c) = CONNECTIONS_TOTAL.get() {
        c.inc();
    }
    if let Some(g) = CONNECTIONS_ACTIVE.get() {
        g.inc();
    }
}

/// A session finished its cleanup.
#[inline]
pub fn connection_closed() {
    if let Some(g) = CONNECTIONS_ACTIVE.get() {
        g.dec();
    }
}

/// Record a dispatched message with its latency.
#[inline]
pub fn record_dispatch(event: &str, duration_secs: f64) {
    if let Some(c) = MESSAGES_DISPATCHED.get() {
        c.with_label_values(&[event]).inc();
    }
    if let Some(h) = DISPATCH_LATENCY.get() {
        h.with_label_values(&[event]).observe(duration_secs);
    }
}

/// Record a handler error.
#[inline]
pub fn record_dispatch_error(event: &str, error: &str) {
    if let Some(c) = DISPATCH_ERRORS.get() {
        c.with_label_values(&[event, error]).inc();
    }
}

/// Record a frame rejected before dispatch.
#[inline]
pub fn record_malformed() {
    if let Some(c) = MALFORMED_PAYLOADS.get() {
        c.inc();
    }
}

/// Record broadcast fan-out: recipients reached and deliveries dropped.
#[inline]
pub fn record_fanout(delivered: usize, dropped: usize) {
    if let Some(h) = MESSAGE_FANOUT.get() {
        h.observe(delivered as f64);
    }
    if dropped > 0
        && let Some(c) = DELIVERIES_DROPPED.get()
    {
        c.inc_by(dropped as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        init();

        record_dispatch("subscribe", 0.001);
        record_dispatch_error("subscribe", "forbidden");
        record_fanout(3, 1);
        record_malformed();

        let output = gather_metrics();
        assert!(output.contains("slbroker_messages_dispatched_total"));
        assert!(output.contains("slbroker_dispatch_errors_total"));
        assert!(output.contains("slbroker_message_fanout"));
    }
}
