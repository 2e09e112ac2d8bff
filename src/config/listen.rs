//! Network listener configuration.

use serde::Deserialize;
use std::net::SocketAddr;

/// WebSocket listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080").
    pub address: SocketAddr,
    /// Allowed origins for CORS (e.g., `["https://example.com"]`).
    /// Empty list allows all origins; `"*"` matches any origin.
    #[serde(default)]
    pub allow_origins: Vec<String>,
}

impl ListenConfig {
    /// Listener on `address` accepting every origin.
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            allow_origins: Vec::new(),
        }
    }

    /// Check the `Origin` header of an upgrade request.
    ///
    /// A request without an `Origin` header is only accepted when no origin
    /// restriction is configured.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allow_origins.is_empty() {
            return true;
        }
        match origin {
            Some(origin) => self
                .allow_origins
                .iter()
                .any(|a| a == "*" || a.eq_ignore_ascii_case(origin)),
            None => false,
        }
    }
}
