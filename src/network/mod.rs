//! Network module.
//!
//! Contains the Gateway (TCP listener performing the WebSocket upgrade) and
//! the per-connection Session running the event loop.

mod connection;
mod gateway;

pub use connection::ExitReason;
pub(crate) use connection::{Session, close_transport};
pub use gateway::Gateway;
