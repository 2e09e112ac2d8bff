//! Vhost - an isolated namespace of users, channels, and connections.
//!
//! The Vhost is the authority over its three registries. Registries are
//! `DashMap`s reached only through the methods below; lookups hand out
//! clones so no shard guard outlives the call.
//!
//! ## Lifecycle
//!
//! A vhost starts running and can be stopped exactly once. `stop` flips the
//! running flag and cancels the vhost's shutdown token; every session holds a
//! child of that token, so loops blocked in a socket read wake up and exit.

use crate::config::SessionConfig;
use crate::error::VhostError;
use crate::handlers::{Dispatcher, FrontApi};
use crate::network::{ExitReason, Session, close_transport};
use crate::state::dashmap_ext::DashMapExt;
use crate::state::{
    AuditEvent, AuditSink, Channel, Connection, ConnectionToken, Permission, TracingAudit, User,
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use slbroker_proto::Transport;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use subtle::ConstantTimeEq;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Collaborators injected into a vhost at construction time.
#[derive(Clone)]
pub struct VhostOptions {
    /// Protocol handler receiving every parsed message.
    pub dispatcher: Arc<dyn Dispatcher>,
    /// Sink for audit lines.
    pub audit: Arc<dyn AuditSink>,
    /// Settings applied to every session.
    pub session: SessionConfig,
}

impl Default for VhostOptions {
    fn default() -> Self {
        Self {
            dispatcher: Arc::new(FrontApi::new()),
            audit: Arc::new(TracingAudit),
            session: SessionConfig::default(),
        }
    }
}

/// An isolated namespace within the broker.
pub struct Vhost {
    path: String,
    running: AtomicBool,
    shutdown: CancellationToken,
    users: DashMap<String, User>,
    channels: DashMap<String, Arc<Channel>>,
    connections: DashMap<ConnectionToken, Arc<Connection>>,
    dispatcher: Arc<dyn Dispatcher>,
    audit: Arc<dyn AuditSink>,
    session: SessionConfig,
    this: Weak<Vhost>,
}

impl Vhost {
    /// Create a running vhost with the default dispatcher and audit sink.
    pub fn new(path: impl Into<String>) -> Arc<Self> {
        Self::with_options(path, VhostOptions::default())
    }

    /// Create a running vhost with injected collaborators.
    pub fn with_options(path: impl Into<String>, options: VhostOptions) -> Arc<Self> {
        let path = path.into();
        Arc::new_cyclic(|this| Self {
            path,
            running: AtomicBool::new(true),
            shutdown: CancellationToken::new(),
            users: DashMap::new(),
            channels: DashMap::new(),
            connections: DashMap::new(),
            dispatcher: options.dispatcher,
            audit: options.audit,
            session: options.session,
            this: this.clone(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session
    }

    fn record(&self, event: AuditEvent) {
        self.audit.record(&self.path, &event);
    }

    fn rejected(&self, op: &'static str, err: VhostError) -> VhostError {
        debug!(vhost = %self.path, op, error = %err, "Registry mutation rejected");
        err
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Register a user account.
    ///
    /// Fails with `InvalidArgument` for an empty name or a zero permission,
    /// and with `AlreadyExists` if the name is taken (the existing record is
    /// left untouched).
    pub fn add_user(&self, name: &str, secret: &str, permission: u32) -> Result<(), VhostError> {
        if name.is_empty() {
            return Err(self.rejected("add_user", VhostError::InvalidArgument("user name is empty")));
        }

        match self.users.entry(name.to_string()) {
            Entry::Occupied(_) => {
                return Err(self.rejected("add_user", VhostError::AlreadyExists(name.to_string())));
            }
            Entry::Vacant(slot) => {
                let Some(permission) = Permission::new(permission) else {
                    return Err(
                        self.rejected("add_user", VhostError::InvalidArgument("permission is zero"))
                    );
                };
                slot.insert(User::new(name.to_string(), secret.to_string(), permission));
            }
        }

        self.record(AuditEvent::AddUser {
            name: name.to_string(),
            permission,
        });
        Ok(())
    }

    /// Remove a user account.
    pub fn delete_user(&self, name: &str) -> Result<(), VhostError> {
        if self.users.remove(name).is_none() {
            return Err(self.rejected("delete_user", VhostError::NotFound(name.to_string())));
        }
        self.record(AuditEvent::DeleteUser {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Change a user's permission in place.
    pub fn set_user_permission(&self, name: &str, permission: u32) -> Result<(), VhostError> {
        {
            let Some(mut user) = self.users.get_mut(name) else {
                return Err(
                    self.rejected("set_user_permission", VhostError::NotFound(name.to_string()))
                );
            };
            let Some(permission) = Permission::new(permission) else {
                drop(user);
                return Err(self.rejected(
                    "set_user_permission",
                    VhostError::InvalidArgument("permission is zero"),
                ));
            };
            user.permission = permission;
        }

        self.record(AuditEvent::SetUserPermission {
            name: name.to_string(),
            permission,
        });
        Ok(())
    }

    /// Snapshot of a user account.
    pub fn get_user(&self, name: &str) -> Option<User> {
        self.users.get_cloned(name)
    }

    /// Snapshot of every user account, sorted by name.
    pub fn users(&self) -> Vec<User> {
        let mut users = self.users.values_cloned();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        users
    }

    /// Check credentials. The secret comparison is constant-time.
    pub fn authenticate(&self, name: &str, secret: &str) -> Option<User> {
        let user = self.get_user(name)?;
        let matches: bool = user.secret.as_bytes().ct_eq(secret.as_bytes()).into();
        matches.then_some(user)
    }

    // ========================================================================
    // Channels
    // ========================================================================

    /// Create a channel, replacing any existing channel of the same name.
    ///
    /// The replaced channel evicts its subscribers and refuses new ones.
    pub fn create_channel(&self, name: &str) -> Arc<Channel> {
        let channel = Arc::new(Channel::new(self.this.clone(), name.to_string()));
        let previous = self.channels.insert(name.to_string(), Arc::clone(&channel));

        if let Some(old) = previous {
            let evicted = old.retire();
            debug!(vhost = %self.path, channel = %name, evicted, "Channel replaced");
        }

        self.record(AuditEvent::CreateChannel {
            name: name.to_string(),
        });
        channel
    }

    pub fn get_channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.get_cloned(name)
    }

    /// Return the channel named `name`, creating it if absent.
    ///
    /// Concurrent callers always observe the same channel object.
    pub fn get_or_create_channel(&self, name: &str) -> Arc<Channel> {
        let mut created = false;
        let channel = Arc::clone(
            self.channels
                .entry(name.to_string())
                .or_insert_with(|| {
                    created = true;
                    Arc::new(Channel::new(self.this.clone(), name.to_string()))
                })
                .value(),
        );

        if created {
            self.record(AuditEvent::CreateChannel {
                name: name.to_string(),
            });
        }
        channel
    }

    /// Snapshot of every channel, sorted by name.
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        let mut channels = self.channels.values_cloned();
        channels.sort_by(|a, b| a.name().cmp(b.name()));
        channels
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Snapshot of the registered connections.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.values_cloned()
    }

    pub fn connection(&self, token: &str) -> Option<Arc<Connection>> {
        self.connections.get_cloned(token)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Wrap a new connection and add it to the registry.
    ///
    /// The returned guard unregisters the connection when dropped.
    pub(crate) fn register(
        self: &Arc<Self>,
        remote_addr: Option<SocketAddr>,
    ) -> (Registration, mpsc::Receiver<Arc<str>>) {
        loop {
            let token = ConnectionToken::generate();
            // Tokens are random; a collision just draws again.
            let Entry::Vacant(slot) = self.connections.entry(token.clone()) else {
                continue;
            };

            let (conn, outgoing) = Connection::new(
                token,
                Arc::downgrade(self),
                remote_addr,
                self.session.outgoing_queue,
                self.shutdown.child_token(),
            );
            slot.insert(Arc::clone(&conn));
            crate::metrics::connection_opened();

            let registration = Registration {
                vhost: Arc::clone(self),
                conn,
            };
            return (registration, outgoing);
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stop the vhost. Idempotent and irreversible.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!(vhost = %self.path, connections = self.connections.len(), "Vhost stopping");
            self.shutdown.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Serve one upgraded WebSocket until its session ends.
    ///
    /// Registers the connection, runs the event loop to completion, then
    /// releases every subscription and unregisters it. A stopped vhost
    /// closes the socket immediately without registering anything.
    pub async fn accept<S>(
        self: &Arc<Self>,
        stream: WebSocketStream<S>,
        remote_addr: Option<SocketAddr>,
    ) -> ExitReason
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut transport = Transport::new(stream);

        if !self.is_running() {
            debug!(vhost = %self.path, "Vhost stopped - refusing session");
            close_transport(&mut transport).await;
            return ExitReason::VhostStopped;
        }

        let (registration, outgoing) = self.register(remote_addr);
        let session = Session::new(
            Arc::clone(self),
            Arc::clone(registration.connection()),
            transport,
            outgoing,
        );
        session.run().await
    }
}

impl std::fmt::Debug for Vhost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vhost")
            .field("path", &self.path)
            .field("running", &self.is_running())
            .field("users", &self.users.len())
            .field("channels", &self.channels.len())
            .field("connections", &self.connections.len())
            .finish()
    }
}

/// Registry membership of one connection.
///
/// Dropping it runs the exit path exactly once: release every channel
/// membership, then remove the connection from the registry.
pub(crate) struct Registration {
    vhost: Arc<Vhost>,
    conn: Arc<Connection>,
}

impl Registration {
    pub(crate) fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let released = self.conn.unsubscribe_all();
        self.vhost
            .connections
            .remove_if(self.conn.token(), |_, c| Arc::ptr_eq(c, &self.conn));
        crate::metrics::connection_closed();
        debug!(
            vhost = %self.vhost.path,
            token = %self.conn.token(),
            released,
            "Connection unregistered"
        );
    }
}
