//! Event handler registry and dispatch.
//!
//! [`FrontApi`] maps event names to handlers and keeps per-event usage
//! counters alongside the Prometheus metrics.

use super::context::{Context, Handler};
use crate::error::{HandlerError, HandlerResult};
use crate::handlers::{
    AuthHandler, BroadcastHandler, CloseHandler, DispatchOutcome, Dispatcher, SubscribeHandler,
    UnsubscribeHandler,
};
use crate::state::Connection;
use crate::telemetry::{DispatchTimer, spans};
use async_trait::async_trait;
use slbroker_proto::Message;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Instrument, debug};

/// Registry of event handlers; the default [`Dispatcher`].
pub struct FrontApi {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
    /// Event usage counters
    event_counts: HashMap<&'static str, AtomicU64>,
}

impl FrontApi {
    /// Create a registry with all built-in handlers registered.
    pub fn new() -> Self {
        Self::empty()
            .with_handler("auth", AuthHandler)
            .with_handler("subscribe", SubscribeHandler)
            .with_handler("unsubscribe", UnsubscribeHandler)
            .with_handler("broadcast", BroadcastHandler)
            .with_handler("close", CloseHandler)
    }

    /// Create a registry without handlers.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            event_counts: HashMap::new(),
        }
    }

    /// Register (or replace) the handler for `event`.
    pub fn with_handler(mut self, event: &'static str, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(event, Box::new(handler));
        self.event_counts.insert(event, AtomicU64::new(0));
        self
    }

    /// Registered event names, sorted.
    pub fn events(&self) -> Vec<&'static str> {
        let mut events: Vec<_> = self.handlers.keys().copied().collect();
        events.sort_unstable();
        events
    }

    /// Event usage statistics, most used first.
    pub fn event_stats(&self) -> Vec<(&'static str, u64)> {
        let mut stats: Vec<_> = self
            .event_counts
            .iter()
            .map(|(event, count)| (*event, count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();

        stats.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        stats
    }
}

impl Default for FrontApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dispatcher for FrontApi {
    async fn dispatch(
        &self,
        conn: &Arc<Connection>,
        msg: &Message,
    ) -> HandlerResult<DispatchOutcome> {
        let Some((&event, handler)) = self.handlers.get_key_value(msg.event.as_str()) else {
            crate::metrics::record_dispatch_error("unknown", "unknown_event");
            return Err(HandlerError::UnknownEvent(msg.event.clone()));
        };

        let Some(vhost) = conn.vhost() else {
            return Err(HandlerError::Internal("vhost dropped".to_string()));
        };

        if let Some(counter) = self.event_counts.get(event) {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        let ctx = Context::new(&vhost, conn);
        let _timer = DispatchTimer::new(event);
        let result = handler
            .handle(&ctx, msg)
            .instrument(spans::dispatch(event, conn.token().as_str()))
            .await;

        if let Err(ref e) = result {
            crate::metrics::record_dispatch_error(event, e.error_code());
            debug!(event, error = %e, "Event error");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Vhost, VhostOptions};
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult<DispatchOutcome> {
            ctx.reply(msg)?;
            Ok(DispatchOutcome::Continue)
        }
    }

    fn msg(value: Value) -> Message {
        Message::parse(value).unwrap()
    }

    #[test]
    fn default_registry_has_builtin_events() {
        assert_eq!(
            FrontApi::new().events(),
            vec!["auth", "broadcast", "close", "subscribe", "unsubscribe"]
        );
    }

    #[tokio::test]
    async fn unknown_event_is_a_client_error() {
        let vhost = Vhost::new("/test");
        let (reg, _rx) = vhost.register(None);
        let api = FrontApi::new();

        let err = api
            .dispatch(reg.connection(), &msg(json!({"dance": {}})))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::UnknownEvent(ref e) if e == "dance"));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn custom_handlers_and_stats() {
        let vhost = Vhost::with_options("/test", VhostOptions::default());
        let (reg, mut rx): (_, mpsc::Receiver<Arc<str>>) = vhost.register(None);
        let api = FrontApi::empty().with_handler("echo", Echo);

        for _ in 0..2 {
            let outcome = api
                .dispatch(reg.connection(), &msg(json!({"echo": {"n": 1}})))
                .await
                .unwrap();
            assert_eq!(outcome, DispatchOutcome::Continue);
        }

        assert_eq!(&*rx.try_recv().unwrap(), r#"{"echo":{"n":1}}"#);
        assert_eq!(api.event_stats(), vec![("echo", 2)]);
    }
}
