//! Gateway - WebSocket listener that routes upgrades to vhosts.
//!
//! The Gateway binds a TCP socket, performs the WebSocket handshake for each
//! incoming client and hands the upgraded stream to the vhost named by the
//! request path. Origin checks and vhost routing happen inside the handshake
//! so refused clients get a proper HTTP status instead of a dropped socket.

use crate::config::ListenConfig;
use crate::state::{Broker, Vhost};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// The Gateway accepts incoming connections and spawns a session for each.
pub struct Gateway {
    listener: TcpListener,
    broker: Arc<Broker>,
    listen: Arc<ListenConfig>,
}

impl Gateway {
    /// Bind the gateway to the configured address.
    pub async fn bind(listen: ListenConfig, broker: Arc<Broker>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(listen.address).await?;
        info!(address = %listener.local_addr()?, "WebSocket listener bound");

        Ok(Self {
            listener,
            broker,
            listen: Arc::new(listen),
        })
    }

    /// Address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` is cancelled.
    ///
    /// Sessions already running are not waited for; they end when their
    /// vhost is stopped.
    #[instrument(skip(self, shutdown), name = "gateway")]
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Gateway shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    debug!(%addr, "WebSocket connection attempt");
                    let broker = Arc::clone(&self.broker);
                    let listen = Arc::clone(&self.listen);
                    tokio::spawn(serve_connection(stream, addr, broker, listen));
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept WebSocket connection");
                }
            }
        }
    }
}

/// Perform the handshake and run the session to completion.
async fn serve_connection(
    stream: TcpStream,
    addr: SocketAddr,
    broker: Arc<Broker>,
    listen: Arc<ListenConfig>,
) {
    let mut routed: Option<Arc<Vhost>> = None;
    let callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let vhost = route(req, &broker, &listen).inspect_err(|refusal| {
            warn!(
                %addr,
                path = %req.uri().path(),
                status = %refusal.status(),
                "WebSocket upgrade refused"
            );
        })?;
        routed = Some(vhost);
        Ok(response)
    };

    let handshake = accept_hdr_async(stream, callback).await;
    let ws_stream = match handshake {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            debug!(%addr, error = %e, "WebSocket handshake failed");
            return;
        }
    };

    // The callback ran to completion if the handshake succeeded.
    let Some(vhost) = routed else {
        return;
    };

    info!(%addr, vhost = %vhost.path(), "WebSocket handshake successful");
    let reason = vhost.accept(ws_stream, Some(addr)).await;
    debug!(%addr, %reason, "WebSocket connection closed");
}

/// Resolve the vhost an upgrade request targets.
///
/// Refusals: 403 for a disallowed origin, 404 for an unknown path, 503 for
/// a stopped vhost.
fn route(req: &Request, broker: &Broker, listen: &ListenConfig) -> Result<Arc<Vhost>, ErrorResponse> {
    let origin = req
        .headers()
        .get("Origin")
        .and_then(|o| o.to_str().ok());
    if !listen.origin_allowed(origin) {
        return Err(refusal(StatusCode::FORBIDDEN, "Origin not allowed"));
    }

    let Some(vhost) = broker.get_vhost(req.uri().path()) else {
        return Err(refusal(StatusCode::NOT_FOUND, "No such vhost"));
    };

    if !vhost.is_running() {
        return Err(refusal(StatusCode::SERVICE_UNAVAILABLE, "Vhost stopped"));
    }

    Ok(vhost)
}

fn refusal(status: StatusCode, body: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(body.to_string()));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str, origin: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(path);
        if let Some(origin) = origin {
            builder = builder.header("Origin", origin);
        }
        builder.body(()).unwrap()
    }

    fn broker() -> Broker {
        let broker = Broker::new();
        broker.add_vhost("/chat").unwrap();
        broker
    }

    fn any_origin() -> ListenConfig {
        ListenConfig::new("127.0.0.1:0".parse().unwrap())
    }

    #[test]
    fn routes_by_request_path() {
        let broker = broker();
        let vhost = route(&request("/chat", None), &broker, &any_origin()).unwrap();
        assert_eq!(vhost.path(), "/chat");
    }

    #[test]
    fn unknown_path_is_not_found() {
        let broker = broker();
        let refused = route(&request("/nope", None), &broker, &any_origin()).unwrap_err();
        assert_eq!(refused.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn query_string_does_not_affect_routing() {
        let broker = broker();
        assert!(route(&request("/chat?token=x", None), &broker, &any_origin()).is_ok());
    }

    #[test]
    fn stopped_vhost_is_unavailable() {
        let broker = broker();
        broker.get_vhost("/chat").unwrap().stop();
        let refused = route(&request("/chat", None), &broker, &any_origin()).unwrap_err();
        assert_eq!(refused.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn origin_restriction_is_enforced() {
        let broker = broker();
        let mut listen = any_origin();
        listen.allow_origins = vec!["https://example.com".to_string()];

        assert!(route(&request("/chat", Some("https://example.com")), &broker, &listen).is_ok());

        let refused = route(&request("/chat", Some("https://evil.test")), &broker, &listen).unwrap_err();
        assert_eq!(refused.status(), StatusCode::FORBIDDEN);

        let refused = route(&request("/chat", None), &broker, &listen).unwrap_err();
        assert_eq!(refused.status(), StatusCode::FORBIDDEN);
    }
}
