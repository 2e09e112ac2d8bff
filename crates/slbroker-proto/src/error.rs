//! Error types for envelope parsing.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// A decoded JSON value that does not form a valid message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The top-level value is not a JSON object.
    #[error("message is not a JSON object")]
    NotAnObject,

    /// The envelope object has no keys.
    #[error("message envelope is empty")]
    EmptyEnvelope,

    /// The envelope carries more than one event.
    #[error("message envelope carries {0} events, expected one")]
    MultipleEvents(usize),

    /// The event name is empty.
    #[error("event name is empty")]
    EmptyEventName,

    /// The event payload is not a JSON object.
    #[error("data of event {0:?} is not an object")]
    InvalidData(String),
}
