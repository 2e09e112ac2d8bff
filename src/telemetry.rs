//! Telemetry utilities for dispatch timing.

use std::time::Instant;

/// Guard for timing a dispatch and recording metrics.
///
/// Records dispatch latency when dropped.
pub struct DispatchTimer {
    event: &'static str,
    start: Instant,
}

impl DispatchTimer {
    /// Start timing a dispatch. `event` is the metric label, so it must come
    /// from a bounded set (registered handler names).
    pub fn new(event: &'static str) -> Self {
        Self {
            event,
            start: Instant::now(),
        }
    }
}

impl Drop for DispatchTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_dispatch(self.event, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, debug_span, info_span};

    /// Span for one client session.
    pub fn session(vhost: &str, token: &str, addr: Option<std::net::SocketAddr>) -> Span {
        match addr {
            Some(addr) => info_span!("session", vhost = %vhost, token = %token, addr = %addr),
            None => info_span!("session", vhost = %vhost, token = %token),
        }
    }

    /// Span for one dispatched event.
    pub fn dispatch(event: &str, token: &str) -> Span {
        debug_span!("dispatch", event = %event, token = %token)
    }
}
