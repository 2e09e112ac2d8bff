//! Channels: named topics connections subscribe to.
//!
//! Channels are owned by their vhost's channel registry and are not removed
//! when their subscriber set becomes empty. Replacing a channel through
//! `Vhost::create_channel` retires the old object: its subscribers are evicted
//! and it refuses new ones.

use crate::state::{Connection, ConnectionToken, Vhost};
use parking_lot::RwLock;
use slbroker_proto::Message;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

#[derive(Default)]
struct Members {
    retired: bool,
    connections: HashMap<ConnectionToken, Arc<Connection>>,
}

/// A named topic within a vhost.
pub struct Channel {
    name: String,
    vhost: Weak<Vhost>,
    members: RwLock<Members>,
}

impl Channel {
    pub(crate) fn new(vhost: Weak<Vhost>, name: String) -> Self {
        Self {
            name,
            vhost,
            members: RwLock::new(Members::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning vhost, if it still exists.
    pub fn vhost(&self) -> Option<Arc<Vhost>> {
        self.vhost.upgrade()
    }

    /// Add `conn` to the subscriber set and record the membership on the
    /// connection.
    ///
    /// Returns `false` if `conn` is already subscribed, has been cleaned up,
    /// or if this channel has been replaced.
    pub fn subscribe(self: &Arc<Self>, conn: &Arc<Connection>) -> bool {
        // Lock order: connection, then channel.
        let mut subs = conn.subscriptions.lock();
        if subs.closed {
            return false;
        }

        {
            let mut members = self.members.write();
            if members.retired || members.connections.contains_key(conn.token()) {
                return false;
            }
            members
                .connections
                .insert(conn.token().clone(), Arc::clone(conn));
        }

        let previous = subs
            .channels
            .insert(self.name.clone(), Arc::downgrade(self));

        // Still a member of a replaced channel with the same name
        if let Some(prev) = previous.and_then(|w| w.upgrade())
            && !Arc::ptr_eq(&prev, self)
        {
            prev.remove_subscriber(conn.token());
        }
        true
    }

    /// Remove `conn` from this channel.
    pub fn unsubscribe(&self, conn: &Connection) -> bool {
        let mut subs = conn.subscriptions.lock();
        let points_here = subs
            .channels
            .get(&self.name)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), self));
        if points_here {
            subs.channels.remove(&self.name);
        }
        self.remove_subscriber(conn.token()) || points_here
    }

    /// Remove a subscriber by token, leaving the connection side untouched.
    pub(crate) fn remove_subscriber(&self, token: &ConnectionToken) -> bool {
        self.members.write().connections.remove(token).is_some()
    }

    /// Evict every subscriber and refuse new ones.
    ///
    /// Returns the number of evicted connections.
    pub(crate) fn retire(&self) -> usize {
        let evicted: Vec<Arc<Connection>> = {
            let mut members = self.members.write();
            members.retired = true;
            members.connections.drain().map(|(_, conn)| conn).collect()
        };

        for conn in &evicted {
            conn.forget_channel(self);
        }
        evicted.len()
    }

    pub fn is_retired(&self) -> bool {
        self.members.read().retired
    }

    pub fn is_subscribed(&self, token: &ConnectionToken) -> bool {
        self.members.read().connections.contains_key(token)
    }

    pub fn subscriber_count(&self) -> usize {
        self.members.read().connections.len()
    }

    /// Snapshot of the current subscribers.
    pub fn subscribers(&self) -> Vec<Arc<Connection>> {
        self.members.read().connections.values().cloned().collect()
    }

    /// Deliver `msg` to every subscriber's outbound queue.
    ///
    /// Returns the number of subscribers the frame was queued for; full or
    /// closed queues are skipped.
    pub fn publish(&self, msg: &Message) -> usize {
        let frame: Arc<str> = Arc::from(msg.to_frame());
        let (delivered, total) = {
            let members = self.members.read();
            let delivered = members
                .connections
                .values()
                .filter(|conn| conn.send_text(Arc::clone(&frame)).is_ok())
                .count();
            (delivered, members.connections.len())
        };
        crate::metrics::record_fanout(delivered, total - delivered);
        delivered
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slbroker_proto::reply;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn conn() -> (Arc<Connection>, mpsc::Receiver<Arc<str>>) {
        Connection::new(
            ConnectionToken::generate(),
            Weak::new(),
            None,
            8,
            CancellationToken::new(),
        )
    }

    fn channel(name: &str) -> Arc<Channel> {
        Arc::new(Channel::new(Weak::new(), name.to_string()))
    }

    #[test]
    fn subscribe_records_both_sides() {
        let ch = channel("room");
        let (c, _rx) = conn();
        assert!(ch.subscribe(&c));
        assert!(!ch.subscribe(&c), "second subscribe is a no-op");
        assert!(ch.is_subscribed(c.token()));
        assert_eq!(c.subscriptions(), vec!["room".to_string()]);
        assert_eq!(ch.subscriber_count(), 1);
    }

    #[test]
    fn unsubscribe_removes_both_sides() {
        let ch = channel("room");
        let (c, _rx) = conn();
        c.subscribe(&ch);
        assert!(ch.unsubscribe(&c));
        assert!(!ch.is_subscribed(c.token()));
        assert!(!c.is_subscribed("room"));
        assert!(!ch.unsubscribe(&c));
    }

    #[test]
    fn unsubscribe_all_releases_every_channel() {
        let a = channel("a");
        let b = channel("b");
        let (c, _rx) = conn();
        c.subscribe(&a);
        c.subscribe(&b);

        assert_eq!(c.unsubscribe_all(), 2);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
        assert!(c.subscriptions().is_empty());

        // Cleaned-up connections cannot rejoin.
        assert!(!c.subscribe(&a));
        assert_eq!(a.subscriber_count(), 0);
    }

    #[test]
    fn retire_evicts_and_refuses() {
        let ch = channel("room");
        let (c, _rx) = conn();
        c.subscribe(&ch);

        assert_eq!(ch.retire(), 1);
        assert!(ch.is_retired());
        assert!(!c.is_subscribed("room"));
        assert!(!ch.subscribe(&c));
    }

    #[test]
    fn retire_keeps_membership_of_replacement() {
        let old = channel("room");
        let new = channel("room");
        let (c, _rx) = conn();
        c.subscribe(&old);
        c.subscribe(&new);
        assert_eq!(old.subscriber_count(), 0, "moving to the replacement leaves the old one");

        old.retire();
        assert!(c.is_subscribed("room"));
        assert!(new.is_subscribed(c.token()));
    }

    #[test]
    fn publish_reaches_all_subscribers() {
        let ch = channel("room");
        let (a, mut rx_a) = conn();
        let (b, mut rx_b) = conn();
        a.subscribe(&ch);
        b.subscribe(&ch);

        let delivered = ch.publish(&reply::event_with("news", "text", "hi"));
        assert_eq!(delivered, 2);
        assert_eq!(&*rx_a.try_recv().unwrap(), r#"{"news":{"text":"hi"}}"#);
        assert_eq!(&*rx_b.try_recv().unwrap(), r#"{"news":{"text":"hi"}}"#);
    }

    #[test]
    fn publish_skips_closed_queues() {
        let ch = channel("room");
        let (a, rx_a) = conn();
        let (b, _rx_b) = conn();
        a.subscribe(&ch);
        b.subscribe(&ch);
        drop(rx_a);

        assert_eq!(ch.publish(&reply::event_with("news", "text", "hi")), 1);
    }
}
