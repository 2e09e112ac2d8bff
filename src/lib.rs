//! slbroker - Straylight WebSocket Broker
//!
//! A vhost-namespaced publish/subscribe broker. Clients connect over
//! WebSocket to a vhost path, authenticate as one of the vhost's users and
//! exchange JSON events through named channels.
//!
//! The library exposes the registries ([`Broker`], [`Vhost`]), the session
//! runner ([`Vhost::accept`]) and the listener ([`Gateway`]) so the broker
//! can be embedded or driven from tests without the `slbrokerd` binary.

pub mod config;
pub mod error;
pub mod handlers;
pub mod http;
pub mod metrics;
pub mod network;
pub mod state;
pub mod telemetry;

pub use crate::config::Config;
pub use crate::error::{BrokerError, HandlerError, VhostError};
pub use crate::handlers::{DispatchOutcome, Dispatcher, FrontApi};
pub use crate::network::{ExitReason, Gateway};
pub use crate::state::{Broker, Channel, Connection, Permission, User, Vhost, VhostOptions};
