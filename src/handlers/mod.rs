//! Event handlers.
//!
//! This module contains the [`Dispatcher`] contract between a session and
//! its protocol logic, and [`FrontApi`], the default dispatcher routing each
//! event name to a [`Handler`].
//!
//! ## Events
//!
//! | event         | payload                       | permission |
//! |---------------|-------------------------------|------------|
//! | `auth`        | `user`, `secret`              | none       |
//! | `subscribe`   | `channel`                     | READ (MANAGE creates) |
//! | `unsubscribe` | `channel`                     | none       |
//! | `broadcast`   | `channel`, `event`, `data`    | WRITE      |
//! | `close`       |                               | none       |

mod auth;
mod channel;
mod connection;
mod core;
mod messaging;

pub use self::auth::AuthHandler;
pub use self::channel::{SubscribeHandler, UnsubscribeHandler};
pub use self::connection::CloseHandler;
pub use self::core::{Context, FrontApi, Handler};
pub use self::messaging::BroadcastHandler;
pub use crate::error::{HandlerError, HandlerResult};

use crate::state::Connection;
use async_trait::async_trait;
use slbroker_proto::Message;
use std::sync::Arc;

/// What the session does after a message was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Keep reading.
    Continue,
    /// End the session after flushing queued frames.
    Close,
}

/// Protocol logic plugged into a vhost.
///
/// Called once per parsed message, sequentially per connection. Replies are
/// queued through [`Connection::send`]. Client errors are reported by the
/// session as error frames; fatal errors end the session.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(
        &self,
        conn: &Arc<Connection>,
        msg: &Message,
    ) -> HandlerResult<DispatchOutcome>;
}
