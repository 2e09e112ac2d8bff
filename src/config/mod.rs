//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Top-level config struct, server identity, and loading
//! - [`listen`]: WebSocket listener configuration (address, allowed origins)
//! - [`session`]: Per-connection settings (malformed payload policy, queue size)
//! - [`vhost`]: Vhost blocks with their bootstrap channels and users
//! - [`validation`]: Startup checks collecting every problem at once

mod listen;
mod session;
mod types;
mod validation;
mod vhost;

pub use listen::ListenConfig;
pub use session::{MalformedPolicy, SessionConfig};
pub use types::{Config, ConfigError, LogFormat, ServerConfig};
pub use validation::{ValidationError, validate};
pub use vhost::{UserConfig, VhostConfig};
