//! BROADCAST handler.

use crate::handlers::core::context::required_str;
use crate::handlers::{Context, DispatchOutcome, Handler, HandlerError, HandlerResult};
use crate::state::Permission;
use async_trait::async_trait;
use serde_json::{Map, Value};
use slbroker_proto::{Message, reply};
use tracing::debug;

/// Field added to broadcast data: the channel it was published on.
pub const CHANNEL_FIELD: &str = "__channel";
/// Field added to broadcast data: the sender's connection token.
pub const SENDER_FIELD: &str = "__sid";

/// Handler for `broadcast {channel, event, data}`.
///
/// Publishes `{event: data}` to every subscriber of an existing channel,
/// the sender included if subscribed. Requires WRITE.
pub struct BroadcastHandler;

#[async_trait]
impl Handler for BroadcastHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult<DispatchOutcome> {
        let name = required_str(msg, "channel")?;
        let event = required_str(msg, "event")?;
        let mut data = match msg.data.get("data") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(HandlerError::BadRequest("'data' must be an object".into())),
        };

        ctx.require(Permission::WRITE)?;

        let channel = ctx
            .vhost
            .get_channel(name)
            .ok_or_else(|| HandlerError::NoSuchChannel(name.to_string()))?;

        data.insert(CHANNEL_FIELD.to_string(), Value::String(name.to_string()));
        data.insert(
            SENDER_FIELD.to_string(),
            Value::String(ctx.conn.token().to_string()),
        );

        let delivered = channel.publish(&reply::event(event, data));
        debug!(channel = %name, event = %event, delivered, "Broadcast");
        Ok(DispatchOutcome::Continue)
    }
}
