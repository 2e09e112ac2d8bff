//! WebSocket transport decoding one JSON value per call.
//!
//! Text and binary frames are decoded as JSON; ping/pong frames are answered
//! by tungstenite and skipped here. A close frame or the end of the stream is
//! reported as [`TransportReadError::EndOfStream`].

mod error;

pub use error::TransportReadError;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tracing::trace;

use crate::message::Message;

/// A WebSocket stream speaking the broker's JSON envelope.
pub struct Transport<S> {
    inner: WebSocketStream<S>,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-upgraded WebSocket stream.
    pub fn new(inner: WebSocketStream<S>) -> Self {
        Self { inner }
    }

    /// Decode exactly one JSON value from the socket.
    ///
    /// Cancel-safe: a value is either fully returned or not consumed.
    pub async fn receive(&mut self) -> Result<Value, TransportReadError> {
        loop {
            let frame = match self.inner.next().await {
                None => return Err(TransportReadError::EndOfStream),
                Some(Err(e)) => return Err(TransportReadError::from_ws(e)),
                Some(Ok(frame)) => frame,
            };

            match frame {
                WsMessage::Text(text) => {
                    return serde_json::from_str(&text)
                        .map_err(|e| TransportReadError::Malformed(e.to_string()));
                }
                WsMessage::Binary(bytes) => {
                    return serde_json::from_slice(&bytes)
                        .map_err(|e| TransportReadError::Malformed(e.to_string()));
                }
                WsMessage::Close(_) => return Err(TransportReadError::EndOfStream),
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {
                    trace!("Skipping control frame");
                }
            }
        }
    }

    /// Send a pre-serialized text frame.
    pub async fn send_text(&mut self, text: String) -> Result<(), tungstenite::Error> {
        self.inner.send(WsMessage::Text(text)).await
    }

    /// Serialize and send a message.
    pub async fn send_message(&mut self, msg: &Message) -> Result<(), tungstenite::Error> {
        self.send_text(msg.to_frame()).await
    }

    /// Start the closing handshake.
    pub async fn close(&mut self) -> Result<(), tungstenite::Error> {
        self.inner.close(None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    async fn pair() -> (Transport<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (server_io, client_io) = tokio::io::duplex(4096);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (Transport::new(server), client)
    }

    #[tokio::test]
    async fn receives_text_and_binary_json() {
        let (mut transport, mut client) = pair().await;
        client
            .send(WsMessage::Text(r#"{"auth": {"user": "alice"}}"#.to_string()))
            .await
            .unwrap();
        client
            .send(WsMessage::Binary(br#"{"close": {}}"#.to_vec()))
            .await
            .unwrap();

        assert_eq!(transport.receive().await.unwrap(), json!({"auth": {"user": "alice"}}));
        assert_eq!(transport.receive().await.unwrap(), json!({"close": {}}));
    }

    #[tokio::test]
    async fn invalid_json_is_malformed_and_stream_continues() {
        let (mut transport, mut client) = pair().await;
        client.send(WsMessage::Text("{oops".to_string())).await.unwrap();
        client.send(WsMessage::Text("{}".to_string())).await.unwrap();

        assert!(matches!(
            transport.receive().await,
            Err(TransportReadError::Malformed(_))
        ));
        assert_eq!(transport.receive().await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn ping_is_skipped() {
        let (mut transport, mut client) = pair().await;
        client.send(WsMessage::Ping(vec![1, 2])).await.unwrap();
        client.send(WsMessage::Text("[]".to_string())).await.unwrap();
        assert_eq!(transport.receive().await.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn close_frame_is_end_of_stream() {
        let (mut transport, mut client) = pair().await;
        client.close(None).await.unwrap();
        assert!(transport.receive().await.unwrap_err().is_end_of_stream());
    }

    #[tokio::test]
    async fn dropped_peer_is_end_of_stream() {
        let (mut transport, client) = pair().await;
        drop(client);
        assert!(transport.receive().await.unwrap_err().is_end_of_stream());
    }

    #[tokio::test]
    async fn sends_serialized_messages() {
        let (mut transport, mut client) = pair().await;
        let msg = crate::reply::event_with("subscribed", "channel", "general");
        transport.send_message(&msg).await.unwrap();

        let frame = client.next().await.unwrap().unwrap();
        let text = frame.into_text().unwrap();
        assert_eq!(text.parse::<Message>().unwrap(), msg);
    }
}
