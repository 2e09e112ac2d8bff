//! Handler context and trait.

use crate::error::{HandlerError, HandlerResult};
use crate::handlers::DispatchOutcome;
use crate::state::{Connection, Permission, User, Vhost};
use async_trait::async_trait;
use slbroker_proto::Message;
use std::sync::Arc;

/// Context passed to each event handler.
pub struct Context<'a> {
    /// The vhost the connection belongs to.
    pub vhost: &'a Arc<Vhost>,
    /// The connection that sent the message.
    pub conn: &'a Arc<Connection>,
}

impl<'a> Context<'a> {
    pub fn new(vhost: &'a Arc<Vhost>, conn: &'a Arc<Connection>) -> Self {
        Self { vhost, conn }
    }

    /// Queue a reply to the sender.
    #[inline]
    pub fn reply(&self, msg: &Message) -> HandlerResult {
        self.conn.send(msg)?;
        Ok(())
    }

    /// The authenticated user, re-read from the registry so permission
    /// changes and deletions take effect immediately.
    pub fn user(&self) -> HandlerResult<User> {
        self.conn
            .authenticated_user()
            .and_then(|name| self.vhost.get_user(&name))
            .ok_or(HandlerError::Unauthorized)
    }

    /// The authenticated user, provided it holds `required`.
    pub fn require(&self, required: Permission) -> HandlerResult<User> {
        let user = self.user()?;
        if user.can(required) {
            Ok(user)
        } else {
            Err(HandlerError::Forbidden)
        }
    }
}

/// Look up a required string field of the payload.
pub(crate) fn required_str<'m>(msg: &'m Message, key: &str) -> HandlerResult<&'m str> {
    match msg.str_field(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(HandlerError::BadRequest(format!("missing field '{key}'"))),
    }
}

/// Handler for a single event.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult<DispatchOutcome>;
}
