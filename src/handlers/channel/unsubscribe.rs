//! UNSUBSCRIBE handler.

use crate::handlers::core::context::required_str;
use crate::handlers::{Context, DispatchOutcome, Handler, HandlerError, HandlerResult};
use async_trait::async_trait;
use slbroker_proto::{Message, reply};
use tracing::debug;

/// Handler for `unsubscribe {channel}`.
pub struct UnsubscribeHandler;

#[async_trait]
impl Handler for UnsubscribeHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult<DispatchOutcome> {
        let name = required_str(msg, "channel")?;

        if !ctx.conn.unsubscribe(name) {
            return Err(HandlerError::NotSubscribed(name.to_string()));
        }
        debug!(channel = %name, "Unsubscribed");

        ctx.reply(&reply::event_with("unsubscribed", "channel", name))?;
        Ok(DispatchOutcome::Continue)
    }
}
