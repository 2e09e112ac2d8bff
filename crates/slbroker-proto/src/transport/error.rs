//! Transport error types.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that can occur when reading from a transport.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportReadError {
    /// The peer closed the connection. This is the normal termination signal.
    #[error("end of stream")]
    EndOfStream,

    /// A frame arrived but its payload is not valid JSON.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The underlying WebSocket failed.
    #[error("transport websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

impl TransportReadError {
    /// Classify a WebSocket error, folding closed-connection conditions into
    /// [`TransportReadError::EndOfStream`].
    pub fn from_ws(err: tungstenite::Error) -> Self {
        use tungstenite::error::ProtocolError as WsProtocolError;

        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::EndOfStream
            }
            tungstenite::Error::Protocol(WsProtocolError::ResetWithoutClosingHandshake) => {
                Self::EndOfStream
            }
            tungstenite::Error::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                Self::EndOfStream
            }
            other => Self::WebSocket(other),
        }
    }

    /// Whether this is the end-of-stream sentinel.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_connections_are_end_of_stream() {
        assert!(TransportReadError::from_ws(tungstenite::Error::ConnectionClosed).is_end_of_stream());
        assert!(TransportReadError::from_ws(tungstenite::Error::AlreadyClosed).is_end_of_stream());

        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(TransportReadError::from_ws(tungstenite::Error::Io(eof)).is_end_of_stream());
    }

    #[test]
    fn other_io_errors_are_kept() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = TransportReadError::from_ws(tungstenite::Error::Io(reset));
        assert!(matches!(err, TransportReadError::WebSocket(_)));
        assert!(err.to_string().contains("reset"));
    }
}
