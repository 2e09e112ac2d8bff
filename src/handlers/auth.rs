//! AUTH handler.

use super::core::context::required_str;
use super::{Context, DispatchOutcome, Handler, HandlerError, HandlerResult};
use async_trait::async_trait;
use slbroker_proto::{Message, reply};
use tracing::{debug, info};

/// Handler for `auth {user, secret}`.
///
/// A connection may re-authenticate; the last successful attempt wins and a
/// failed attempt leaves the previous identity in place.
pub struct AuthHandler;

#[async_trait]
impl Handler for AuthHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult<DispatchOutcome> {
        let name = required_str(msg, "user")?;
        let secret = required_str(msg, "secret")?;

        let Some(user) = ctx.vhost.authenticate(name, secret) else {
            debug!(user = %name, "Authentication failed");
            return Err(HandlerError::Unauthorized);
        };

        ctx.conn.set_authenticated_user(Some(user.name.clone()));
        info!(user = %user.name, permission = %user.permission, "Authenticated");

        ctx.reply(&reply::event_with("authenticated", "user", &user.name))?;
        Ok(DispatchOutcome::Continue)
    }
}
