//! Connection handles.
//!
//! A [`Connection`] is the shared handle of one accepted socket. The socket
//! itself is owned by the session task running the event loop; everything
//! else (token, subscriptions, outbound queue, authenticated user) lives here
//! so handlers, channels, and administrative callers can reach it.
//!
//! ## Lock ordering
//!
//! When both are needed, a connection's subscription lock is always taken
//! before a channel's subscriber lock. Code holding a channel lock never
//! takes a connection lock.

use crate::error::SendError;
use crate::state::{Channel, ConnectionToken, Vhost};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use slbroker_proto::Message;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Channel memberships of one connection.
#[derive(Default)]
pub(crate) struct Subscriptions {
    /// Set once at cleanup; no further subscriptions are accepted.
    pub(crate) closed: bool,
    /// Channel name to the channel object joined under that name.
    pub(crate) channels: HashMap<String, Weak<Channel>>,
}

/// A live client session.
pub struct Connection {
    token: ConnectionToken,
    vhost: Weak<Vhost>,
    remote_addr: Option<SocketAddr>,
    connected_at: DateTime<Utc>,
    pub(crate) subscriptions: Mutex<Subscriptions>,
    user: RwLock<Option<String>>,
    outgoing: mpsc::Sender<Arc<str>>,
    shutdown: CancellationToken,
}

impl Connection {
    /// Create a connection handle and the receiving end of its outbound queue.
    pub(crate) fn new(
        token: ConnectionToken,
        vhost: Weak<Vhost>,
        remote_addr: Option<SocketAddr>,
        queue_capacity: usize,
        shutdown: CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<Arc<str>>) {
        let (outgoing, rx) = mpsc::channel(queue_capacity.max(1));
        let conn = Arc::new(Self {
            token,
            vhost,
            remote_addr,
            connected_at: Utc::now(),
            subscriptions: Mutex::new(Subscriptions::default()),
            user: RwLock::new(None),
            outgoing,
            shutdown,
        });
        (conn, rx)
    }

    pub fn token(&self) -> &ConnectionToken {
        &self.token
    }

    /// The owning vhost, if it still exists.
    pub fn vhost(&self) -> Option<Arc<Vhost>> {
        self.vhost.upgrade()
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Name of the user this connection authenticated as.
    pub fn authenticated_user(&self) -> Option<String> {
        self.user.read().clone()
    }

    pub fn set_authenticated_user(&self, name: Option<String>) {
        *self.user.write() = name;
    }

    /// Subscribe to `channel`. Returns `false` if already subscribed, if the
    /// channel was replaced, or if this connection has been cleaned up.
    pub fn subscribe(self: &Arc<Self>, channel: &Arc<Channel>) -> bool {
        channel.subscribe(self)
    }

    /// Leave the channel joined under `name`.
    pub fn unsubscribe(&self, name: &str) -> bool {
        let mut subs = self.subscriptions.lock();
        match subs.channels.remove(name) {
            Some(weak) => {
                if let Some(channel) = weak.upgrade() {
                    channel.remove_subscriber(&self.token);
                }
                true
            }
            None => false,
        }
    }

    /// Names of the channels this connection is subscribed to.
    pub fn subscriptions(&self) -> Vec<String> {
        let subs = self.subscriptions.lock();
        let mut names: Vec<String> = subs.channels.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_subscribed(&self, name: &str) -> bool {
        self.subscriptions.lock().channels.contains_key(name)
    }

    /// Release every channel membership and refuse new ones.
    ///
    /// Returns the number of memberships released.
    pub fn unsubscribe_all(&self) -> usize {
        let drained: Vec<Weak<Channel>> = {
            let mut subs = self.subscriptions.lock();
            subs.closed = true;
            subs.channels.drain().map(|(_, weak)| weak).collect()
        };

        for weak in &drained {
            if let Some(channel) = weak.upgrade() {
                channel.remove_subscriber(&self.token);
            }
        }
        drained.len()
    }

    /// Drop the membership entry for `channel` if it still points at it.
    pub(crate) fn forget_channel(&self, channel: &Channel) {
        let mut subs = self.subscriptions.lock();
        let points_here = subs
            .channels
            .get(channel.name())
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), channel));
        if points_here {
            subs.channels.remove(channel.name());
        }
    }

    /// Queue a message for delivery to the client.
    pub fn send(&self, msg: &Message) -> Result<(), SendError> {
        self.send_text(Arc::from(msg.to_frame()))
    }

    /// Queue a pre-serialized frame. Never blocks.
    pub fn send_text(&self, frame: Arc<str>) -> Result<(), SendError> {
        self.outgoing.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Ask the session to terminate. The event loop observes this even while
    /// blocked in a socket read.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closing(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("token", &self.token)
            .field("remote_addr", &self.remote_addr)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slbroker_proto::reply;

    fn detached(capacity: usize) -> (Arc<Connection>, mpsc::Receiver<Arc<str>>) {
        Connection::new(
            ConnectionToken::generate(),
            Weak::new(),
            None,
            capacity,
            CancellationToken::new(),
        )
    }

    #[test]
    fn send_enqueues_serialized_frame() {
        let (conn, mut rx) = detached(4);
        conn.send(&reply::event_with("subscribed", "channel", "a")).unwrap();
        let frame = rx.try_recv().unwrap();
        assert_eq!(&*frame, r#"{"subscribed":{"channel":"a"}}"#);
    }

    #[test]
    fn full_queue_reports_full() {
        let (conn, _rx) = detached(1);
        conn.send_text(Arc::from("1")).unwrap();
        assert_eq!(conn.send_text(Arc::from("2")), Err(SendError::Full));
    }

    #[test]
    fn dropped_receiver_reports_closed() {
        let (conn, rx) = detached(1);
        drop(rx);
        assert_eq!(conn.send_text(Arc::from("x")), Err(SendError::Closed));
    }

    #[test]
    fn close_cancels_token() {
        let (conn, _rx) = detached(1);
        assert!(!conn.is_closing());
        conn.close();
        assert!(conn.is_closing());
        assert!(conn.shutdown_token().is_cancelled());
    }

    #[test]
    fn authenticated_user_roundtrip() {
        let (conn, _rx) = detached(1);
        assert_eq!(conn.authenticated_user(), None);
        conn.set_authenticated_user(Some("alice".into()));
        assert_eq!(conn.authenticated_user().as_deref(), Some("alice"));
    }

    #[test]
    fn vhost_backref_is_weak() {
        let (conn, _rx) = detached(1);
        assert!(conn.vhost().is_none());
    }
}
