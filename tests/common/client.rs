//! Test WebSocket client.
//!
//! Sends JSON envelopes and asserts on the frames the broker sends back.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// A test broker client.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Connect to a WebSocket URL.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (ws, _response) = connect_async(url).await?;
        Ok(Self { ws })
    }

    /// Send a raw text frame.
    pub async fn send_raw(&mut self, text: &str) -> anyhow::Result<()> {
        self.ws.send(WsMessage::Text(text.to_string())).await?;
        Ok(())
    }

    /// Send a JSON value.
    pub async fn send(&mut self, value: Value) -> anyhow::Result<()> {
        self.send_raw(&value.to_string()).await
    }

    /// Receive the next JSON frame.
    pub async fn recv(&mut self) -> anyhow::Result<Value> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive the next JSON frame with a timeout.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Value> {
        loop {
            let frame = timeout(dur, self.ws.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("connection closed"))??;
            match frame {
                WsMessage::Text(text) => return Ok(serde_json::from_str(&text)?),
                WsMessage::Close(_) => anyhow::bail!("connection closed"),
                _ => continue,
            }
        }
    }

    /// Assert nothing arrives within `dur`.
    pub async fn expect_silence(&mut self, dur: Duration) -> anyhow::Result<()> {
        match self.recv_timeout(dur).await {
            Err(e) if e.is::<tokio::time::error::Elapsed>() => Ok(()),
            Err(e) => Err(e),
            Ok(frame) => anyhow::bail!("unexpected frame: {frame}"),
        }
    }

    /// Wait for the server to close the connection.
    pub async fn expect_closed(&mut self) -> anyhow::Result<()> {
        loop {
            match timeout(Duration::from_secs(5), self.ws.next()).await? {
                None | Some(Ok(WsMessage::Close(_))) | Some(Err(_)) => return Ok(()),
                Some(Ok(WsMessage::Text(text))) => anyhow::bail!("unexpected frame: {text}"),
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Authenticate and wait for the acknowledgement.
    pub async fn auth(&mut self, user: &str, secret: &str) -> anyhow::Result<()> {
        self.send(json!({"auth": {"user": user, "secret": secret}}))
            .await?;
        let reply = self.recv().await?;
        if reply != json!({"authenticated": {"user": user}}) {
            anyhow::bail!("authentication failed: {reply}");
        }
        Ok(())
    }

    /// Subscribe and wait for the acknowledgement.
    pub async fn subscribe(&mut self, channel: &str) -> anyhow::Result<()> {
        self.send(json!({"subscribe": {"channel": channel}})).await?;
        let reply = self.recv().await?;
        if reply != json!({"subscribed": {"channel": channel}}) {
            anyhow::bail!("subscribe failed: {reply}");
        }
        Ok(())
    }

    /// Start the closing handshake.
    pub async fn close(&mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
