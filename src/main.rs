//! slbrokerd - Straylight WebSocket Broker daemon.

use slbroker::config::{LogFormat, validate};
use slbroker::{Broker, Config, Gateway, http, metrics};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long running sessions get to wind down after a stop.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)
        .map_err(|e| anyhow::anyhow!("failed to load {config_path}: {e}"))?;

    init_tracing(config.server.log_format);

    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(path = %config_path, error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {config_path}", errors.len());
    }

    info!(
        server = %config.server.name,
        vhosts = config.vhost.len(),
        "Starting slbroker"
    );

    let shutdown = CancellationToken::new();

    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        tokio::spawn(http::run_http_server(metrics_port, shutdown.child_token()));
    }

    let broker = Arc::new(Broker::from_config(&config)?);
    for vhost in broker.vhosts() {
        info!(
            vhost = %vhost.path(),
            users = vhost.users().len(),
            channels = vhost.channels().len(),
            "Vhost ready"
        );
    }

    let gateway = Gateway::bind(config.listen.clone(), Arc::clone(&broker)).await?;
    let gateway_task = tokio::spawn(gateway.run(shutdown.child_token()));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown requested");
        }
        result = gateway_task => {
            // The gateway only returns on its own when accepting failed for good.
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "Gateway failed"),
                Err(e) => error!(error = %e, "Gateway task panicked"),
            }
        }
    }

    shutdown.cancel();
    broker.stop();
    drain(&broker).await;

    info!("slbroker stopped");
    Ok(())
}

/// Wait for every session to unregister, up to [`DRAIN_TIMEOUT`].
async fn drain(broker: &Broker) {
    let open = || -> usize { broker.vhosts().iter().map(|v| v.connection_count()).sum() };

    let waited = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while open() > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;

    if waited.is_err() {
        warn!(remaining = open(), "Sessions still open after drain timeout");
    }
}
