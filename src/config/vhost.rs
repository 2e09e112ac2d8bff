//! Vhost blocks.

use serde::Deserialize;

/// A vhost created at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct VhostConfig {
    /// Request path selecting this vhost (e.g., "/chat").
    pub path: String,
    /// Channels created up front.
    #[serde(default)]
    pub channels: Vec<String>,
    /// User accounts.
    #[serde(default)]
    pub user: Vec<UserConfig>,
}

/// A user account inside a vhost block.
#[derive(Clone, Deserialize)]
pub struct UserConfig {
    pub name: String,
    pub secret: String,
    /// Permission bits: 1 read, 2 write, 4 manage.
    pub permission: u32,
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .field("permission", &self.permission)
            .finish()
    }
}
