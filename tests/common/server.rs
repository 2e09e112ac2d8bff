//! Test server management.
//!
//! Runs a broker and its gateway inside the test runtime on an ephemeral
//! port, so tests can poke at the registries directly.

use slbroker::config::ListenConfig;
use slbroker::{Broker, Gateway, Vhost, VhostOptions};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Vhost created by [`TestServer::spawn`].
pub const VHOST: &str = "/chat";
/// Channel created in [`VHOST`].
pub const CHANNEL: &str = "general";
/// Secret shared by every seeded user.
pub const SECRET: &str = "pw";

/// A running broker.
pub struct TestServer {
    addr: SocketAddr,
    broker: Arc<Broker>,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Spawn a broker with one vhost, one channel and three users:
    /// `admin` (7), `writer` (3) and `reader` (1).
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with(VhostOptions::default(), Vec::new()).await
    }

    /// Spawn with custom vhost options and origin allow-list.
    pub async fn spawn_with(
        options: VhostOptions,
        allow_origins: Vec<String>,
    ) -> anyhow::Result<Self> {
        let broker = Arc::new(Broker::with_options(options));
        let vhost = broker.add_vhost(VHOST)?;
        vhost.create_channel(CHANNEL);
        vhost.add_user("admin", SECRET, 7)?;
        vhost.add_user("writer", SECRET, 3)?;
        vhost.add_user("reader", SECRET, 1)?;

        let mut listen = ListenConfig::new("127.0.0.1:0".parse()?);
        listen.allow_origins = allow_origins;

        let gateway = Gateway::bind(listen, Arc::clone(&broker)).await?;
        let addr = gateway.local_addr()?;
        let shutdown = CancellationToken::new();
        tokio::spawn(gateway.run(shutdown.clone()));

        Ok(Self {
            addr,
            broker,
            shutdown,
        })
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// The seeded vhost.
    pub fn vhost(&self) -> Arc<Vhost> {
        self.broker.get_vhost(VHOST).expect("seeded vhost")
    }

    /// WebSocket URL for a vhost path.
    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Connect a client to the seeded vhost.
    pub async fn connect(&self) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(&self.url(VHOST)).await
    }

    /// Connect and authenticate as `user`.
    pub async fn login(&self, user: &str) -> anyhow::Result<super::client::TestClient> {
        let mut client = self.connect().await?;
        client.auth(user, SECRET).await?;
        Ok(client)
    }

    /// Wait until the seeded vhost has exactly `count` registered sessions.
    pub async fn wait_for_connections(&self, count: usize) -> anyhow::Result<()> {
        let vhost = self.vhost();
        for _ in 0..100 {
            if vhost.connection_count() == count {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!(
            "expected {count} connections, found {}",
            vhost.connection_count()
        )
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.broker.stop();
    }
}
