//! HTTP server for the Prometheus metrics endpoint.
//!
//! Runs on its own tokio task, separate from the WebSocket listener, and
//! serves `/metrics` for scraping plus `/healthz` for liveness checks.

use axum::{Router, routing::get};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn health_handler() -> &'static str {
    "ok"
}

pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
}

/// Serve the metrics router on an already-bound listener until `shutdown`
/// is cancelled.
pub async fn serve(listener: TcpListener, shutdown: CancellationToken) -> std::io::Result<()> {
    axum::serve(listener, router())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Run the HTTP server for Prometheus metrics.
///
/// Binds to `0.0.0.0:port`. Bind and serve failures are logged, never
/// propagated: the broker keeps running without metrics.
pub async fn run_http_server(port: u16, shutdown: CancellationToken) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind metrics server");
            return;
        }
    };
    tracing::info!(%addr, "Prometheus HTTP server listening");

    if let Err(e) = serve(listener, shutdown).await {
        tracing::error!(error = %e, "Metrics server error");
    }
}
