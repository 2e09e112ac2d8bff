//! CLOSE handler.

use crate::handlers::{Context, DispatchOutcome, Handler, HandlerResult};
use async_trait::async_trait;
use slbroker_proto::Message;
use tracing::info;

/// Handler for `close {}`: ends the session after queued frames are flushed.
pub struct CloseHandler;

#[async_trait]
impl Handler for CloseHandler {
    async fn handle(&self, ctx: &Context<'_>, _msg: &Message) -> HandlerResult<DispatchOutcome> {
        info!(
            token = %ctx.conn.token(),
            user = ?ctx.conn.authenticated_user(),
            "Client requested close"
        );
        Ok(DispatchOutcome::Close)
    }
}
