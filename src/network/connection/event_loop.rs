//! Per-connection event loop.
//!
//! Every inbound outcome maps to exactly one transition:
//!
//! | input                     | next                                   |
//! |---------------------------|----------------------------------------|
//! | message parsed            | dispatch                               |
//! | end of stream             | closed                                 |
//! | undecodable / unparseable | 400 error frame, then policy decides   |
//! | socket error              | closed                                 |
//! | dispatch: continue        | active                                 |
//! | dispatch: close           | flush queue, closed                    |
//! | dispatch: client error    | error frame, active                    |
//! | dispatch: fatal error     | closed                                 |
//! | cancellation              | close frame, closed                    |
//! | cancellation during write | closed, no close frame                 |
//! | queued outbound frame     | write, active                          |
//!
//! Every socket write races the shutdown token, and the closing handshake
//! is bounded by a timeout, so a peer that stops reading cannot keep a
//! stopped session alive.

use super::error_handling::{ReadErrorAction, classify_read_error};
use super::{ExitReason, Session, close_transport};
use crate::config::MalformedPolicy;
use crate::handlers::DispatchOutcome;
use crate::state::Vhost;
use serde_json::Value;
use slbroker_proto::{Message, Transport, TransportReadError, reply};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

enum SelectResult {
    /// A parsed message to dispatch
    Dispatch(Message),
    /// A frame that could not be turned into a message
    Malformed { reason: String },
    /// A frame queued for this connection
    Outgoing(Arc<str>),
    /// Peer closed the stream
    EndOfStream,
    /// Socket read failed
    TransportError { error: String },
    /// Vhost stop or connection close
    Cancelled,
}

fn process_read_result(result: Result<Value, TransportReadError>) -> SelectResult {
    match result {
        Ok(value) => match Message::parse(value) {
            Ok(msg) => SelectResult::Dispatch(msg),
            Err(e) => SelectResult::Malformed {
                reason: e.to_string(),
            },
        },
        Err(e) => match classify_read_error(e) {
            ReadErrorAction::EndOfStream => SelectResult::EndOfStream,
            ReadErrorAction::Malformed { reason } => SelectResult::Malformed { reason },
            ReadErrorAction::IoError { error } => SelectResult::TransportError { error },
        },
    }
}

/// Why a socket write did not complete.
enum WriteFailure {
    /// Shutdown fired while the write was pending.
    Cancelled,
    Socket(tungstenite::Error),
}

/// Write one text frame, giving up as soon as `shutdown` fires.
async fn write_frame<S>(
    transport: &mut Transport<S>,
    shutdown: &CancellationToken,
    text: String,
) -> Result<(), WriteFailure>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tokio::select! {
        biased;

        _ = shutdown.cancelled() => Err(WriteFailure::Cancelled),

        result = transport.send_text(text) => result.map_err(WriteFailure::Socket),
    }
}

/// Write every frame already queued for this connection.
async fn flush_queued<S>(
    transport: &mut Transport<S>,
    shutdown: &CancellationToken,
    outgoing: &mut mpsc::Receiver<Arc<str>>,
) -> Result<(), WriteFailure>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Ok(frame) = outgoing.try_recv() {
        write_frame(transport, shutdown, frame.to_string()).await?;
    }
    Ok(())
}

/// Send a frame the loop produced itself, after anything already queued so
/// the client sees replies in order.
async fn write_direct<S>(
    transport: &mut Transport<S>,
    shutdown: &CancellationToken,
    outgoing: &mut mpsc::Receiver<Arc<str>>,
    msg: &Message,
) -> Result<(), WriteFailure>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    flush_queued(transport, shutdown, outgoing).await?;
    write_frame(transport, shutdown, msg.to_frame()).await
}

/// Exit reason once the shutdown token has fired.
fn cancelled_exit(vhost: &Vhost) -> ExitReason {
    if vhost.is_running() {
        debug!("Connection closed by server");
        ExitReason::Closed
    } else {
        debug!("Vhost stopped - closing connection");
        ExitReason::VhostStopped
    }
}

/// Exit reason for a write that did not complete. A write cut short by
/// cancellation skips the closing handshake.
fn write_failed(vhost: &Vhost, failure: WriteFailure) -> ExitReason {
    match failure {
        WriteFailure::Cancelled => cancelled_exit(vhost),
        WriteFailure::Socket(e) => {
            warn!(error = %e, "Write error");
            ExitReason::WriteError
        }
    }
}

/// Run the event loop until the session ends.
pub(super) async fn run_event_loop<S>(session: Session<S>) -> ExitReason
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let Session {
        vhost,
        conn,
        mut transport,
        mut outgoing,
    } = session;
    let shutdown = conn.shutdown_token().clone();
    let policy = vhost.session_config().malformed_payload;

    loop {
        if !vhost.is_running() {
            debug!("Vhost stopped - leaving event loop");
            close_transport(&mut transport).await;
            return ExitReason::VhostStopped;
        }

        let select_result = tokio::select! {
            biased;

            _ = shutdown.cancelled() => SelectResult::Cancelled,

            Some(frame) = outgoing.recv() => SelectResult::Outgoing(frame),

            result = transport.receive() => process_read_result(result),
        };

        match select_result {
            SelectResult::Dispatch(msg) => {
                match vhost.dispatcher().dispatch(&conn, &msg).await {
                    Ok(DispatchOutcome::Continue) => continue,

                    Ok(DispatchOutcome::Close) => {
                        match flush_queued(&mut transport, &shutdown, &mut outgoing).await {
                            Ok(()) => {}
                            Err(WriteFailure::Cancelled) => return cancelled_exit(&vhost),
                            Err(WriteFailure::Socket(e)) => {
                                debug!(error = %e, "Failed to flush before close");
                            }
                        }
                        close_transport(&mut transport).await;
                        return ExitReason::Dispatcher;
                    }

                    Err(e) if e.is_fatal() => {
                        warn!(event = %msg.event, error = %e, "Fatal handler error");
                        return ExitReason::Fatal(e.error_code());
                    }

                    Err(e) => {
                        debug!(event = %msg.event, error = %e, status = e.status(), "Handler error");
                        let Some(reply) = e.to_reply() else {
                            continue;
                        };
                        if let Err(failure) =
                            write_direct(&mut transport, &shutdown, &mut outgoing, &reply).await
                        {
                            return write_failed(&vhost, failure);
                        }
                    }
                }
            }

            SelectResult::Malformed { reason } => {
                crate::metrics::record_malformed();
                warn!(%reason, policy = ?policy, "Malformed payload");

                let bad_request = reply::bad_request();
                if let Err(failure) =
                    write_direct(&mut transport, &shutdown, &mut outgoing, &bad_request).await
                {
                    return write_failed(&vhost, failure);
                }

                match policy {
                    MalformedPolicy::Skip => continue,
                    MalformedPolicy::Disconnect => {
                        close_transport(&mut transport).await;
                        return ExitReason::MalformedPayload;
                    }
                }
            }

            SelectResult::Outgoing(frame) => {
                if let Err(failure) = write_frame(&mut transport, &shutdown, frame.to_string()).await {
                    return write_failed(&vhost, failure);
                }
            }

            SelectResult::EndOfStream => {
                debug!("Client disconnected");
                return ExitReason::EndOfStream;
            }

            SelectResult::TransportError { error } => {
                debug!(%error, "Transport error");
                return ExitReason::TransportError;
            }

            SelectResult::Cancelled => {
                close_transport(&mut transport).await;
                return cancelled_exit(&vhost);
            }
        }
    }
}
