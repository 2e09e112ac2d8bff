//! SUBSCRIBE handler.

use crate::handlers::core::context::required_str;
use crate::handlers::{Context, DispatchOutcome, Handler, HandlerError, HandlerResult};
use crate::state::Permission;
use async_trait::async_trait;
use slbroker_proto::{Message, reply};
use tracing::debug;

/// Handler for `subscribe {channel}`.
///
/// Requires READ. A missing channel is created on demand when the user also
/// holds MANAGE.
pub struct SubscribeHandler;

#[async_trait]
impl Handler for SubscribeHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult<DispatchOutcome> {
        let name = required_str(msg, "channel")?;
        let user = ctx.require(Permission::READ)?;

        let channel = match ctx.vhost.get_channel(name) {
            Some(channel) => channel,
            None if user.can(Permission::MANAGE) => ctx.vhost.get_or_create_channel(name),
            None => return Err(HandlerError::NoSuchChannel(name.to_string())),
        };

        // Refused only if the channel was replaced in the meantime.
        if !ctx.conn.subscribe(&channel) && !ctx.conn.is_subscribed(name) {
            return Err(HandlerError::NoSuchChannel(name.to_string()));
        }
        debug!(channel = %name, user = %user.name, "Subscribed");

        ctx.reply(&reply::event_with("subscribed", "channel", name))?;
        Ok(DispatchOutcome::Continue)
    }
}
