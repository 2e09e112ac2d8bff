//! State management module.
//!
//! Contains the [`Broker`] (server-wide vhost registry), the [`Vhost`]
//! namespace with its user, channel, and connection registries, and the
//! entities those registries hold.

mod audit;
mod broker;
mod channel;
mod connection;
pub(crate) mod dashmap_ext;
mod token;
mod user;
mod vhost;

pub use audit::{AuditEvent, AuditSink, RecordingAudit, TracingAudit, audit_line};
pub use broker::Broker;
pub use channel::Channel;
pub use connection::Connection;
pub use token::ConnectionToken;
pub use user::{Permission, User};
pub use vhost::{Vhost, VhostOptions};
