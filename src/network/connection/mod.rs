//! Session - drives one connection from registration to cleanup.
//!
//! Each session runs in its own Tokio task:
//!
//! ```text
//!    ┌──────────────────────────────────────────────┐
//!    │                 Session task                 │
//!    │                                              │
//!    │   Transport::receive ──┐                     │
//!    │   outbound queue ──────┼──▶ tokio::select!   │
//!    │   shutdown token ──────┘        │            │
//!    │                                 ▼            │
//!    │                      Dispatcher::dispatch    │
//!    │                         (replies queued)     │
//!    └──────────────────────────────────────────────┘
//! ```
//!
//! The socket is owned by the session alone. Channel deliveries and handler
//! replies reach it through the connection's bounded outbound queue.

mod error_handling;
mod event_loop;

use crate::state::{Connection, Vhost};
use crate::telemetry::spans;
use slbroker_proto::Transport;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info};

/// Longest a closing handshake may take before the socket is dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The vhost was stopped (before or during the session).
    VhostStopped,
    /// [`Connection::close`] was called.
    Closed,
    /// The peer closed the stream.
    EndOfStream,
    /// The dispatcher asked to end the session.
    Dispatcher,
    /// A malformed payload under the `disconnect` policy.
    MalformedPayload,
    /// A fatal handler error, by error code.
    Fatal(&'static str),
    /// Reading from the socket failed.
    TransportError,
    /// Writing to the socket failed.
    WriteError,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VhostStopped => f.write_str("vhost stopped"),
            Self::Closed => f.write_str("closed"),
            Self::EndOfStream => f.write_str("end of stream"),
            Self::Dispatcher => f.write_str("closed by dispatcher"),
            Self::MalformedPayload => f.write_str("malformed payload"),
            Self::Fatal(code) => write!(f, "fatal handler error: {code}"),
            Self::TransportError => f.write_str("transport error"),
            Self::WriteError => f.write_str("write error"),
        }
    }
}

/// One accepted connection and the socket it owns.
pub(crate) struct Session<S> {
    vhost: Arc<Vhost>,
    conn: Arc<Connection>,
    transport: Transport<S>,
    outgoing: mpsc::Receiver<Arc<str>>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(
        vhost: Arc<Vhost>,
        conn: Arc<Connection>,
        transport: Transport<S>,
        outgoing: mpsc::Receiver<Arc<str>>,
    ) -> Self {
        Self {
            vhost,
            conn,
            transport,
            outgoing,
        }
    }

    /// Run the event loop until the session ends.
    pub(crate) async fn run(self) -> ExitReason {
        let span = spans::session(
            self.vhost.path(),
            self.conn.token().as_str(),
            self.conn.remote_addr(),
        );

        async move {
            info!("Session started");
            let reason = event_loop::run_event_loop(self).await;
            info!(%reason, "Session ended");
            reason
        }
        .instrument(span)
        .await
    }
}

/// Best-effort closing handshake, bounded by [`CLOSE_TIMEOUT`] so a peer
/// that stopped reading cannot hold the session open.
pub(crate) async fn close_transport<S>(transport: &mut Transport<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::time::timeout(CLOSE_TIMEOUT, transport.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Close handshake failed"),
        Err(_) => debug!("Close handshake timed out"),
    }
}
