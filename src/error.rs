//! Unified error handling for slbroker.
//!
//! This module provides the error hierarchy for the broker: registry errors
//! returned to administrative callers, handler errors turned into client
//! error frames, and queueing errors raised by connection handles.

use slbroker_proto::{Message, reply};
use thiserror::Error;

// ============================================================================
// Registry Errors (administrative operations)
// ============================================================================

/// Errors returned by vhost registry mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VhostError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("user already exists: {0}")]
    AlreadyExists(String),

    #[error("user not found: {0}")]
    NotFound(String),
}

/// Errors returned by broker-level vhost management.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("invalid vhost path: {0:?} (must start with '/')")]
    InvalidPath(String),

    #[error("vhost already exists: {0}")]
    AlreadyExists(String),

    #[error("vhost not found: {0}")]
    NotFound(String),

    #[error("vhost {vhost}: {source}")]
    Vhost {
        vhost: String,
        #[source]
        source: VhostError,
    },
}

// ============================================================================
// Connection Errors (outbound queue)
// ============================================================================

/// Failure to enqueue a frame for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("outbound queue full")]
    Full,

    #[error("connection closed")]
    Closed,
}

// ============================================================================
// Handler Errors (message dispatch)
// ============================================================================

/// Errors that can occur while dispatching a client message.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("no such channel: {0}")]
    NoSuchChannel(String),

    #[error("not subscribed: {0}")]
    NotSubscribed(String),

    #[error("send error: {0}")]
    Send(#[from] SendError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::UnknownEvent(_) => "unknown_event",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NoSuchChannel(_) => "no_such_channel",
            Self::NotSubscribed(_) => "not_subscribed",
            Self::Send(_) => "send_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Status code carried by the client error frame.
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::UnknownEvent(_) => 400,
            Self::Unauthorized => 402,
            Self::Forbidden => 403,
            Self::NoSuchChannel(_) => 454,
            Self::NotSubscribed(_) => 455,
            Self::Send(_) | Self::Internal(_) => 597,
        }
    }

    /// Fatal errors terminate the session instead of being reported.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Send(_) | Self::Internal(_))
    }

    /// Convert to a client error frame.
    ///
    /// Returns `None` for fatal errors, which close the connection without
    /// a reply.
    pub fn to_reply(&self) -> Option<Message> {
        let text = match self {
            Self::BadRequest(_) => "Bad request",
            Self::UnknownEvent(_) => "Unknown event",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NoSuchChannel(_) => "Channel not found",
            Self::NotSubscribed(_) => "Not subscribed",
            Self::Send(_) | Self::Internal(_) => return None,
        };
        Some(reply::error(self.status(), text))
    }
}

/// Result type for event handlers.
pub type HandlerResult<T = ()> = Result<T, HandlerError>;
