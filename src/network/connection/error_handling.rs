//! Classification of inbound frames that cannot be dispatched.

use slbroker_proto::TransportReadError;

/// Classification of transport read errors for appropriate handling.
pub(super) enum ReadErrorAction {
    /// Peer closed the stream - normal termination
    EndOfStream,
    /// Frame arrived but is not JSON - subject to the malformed payload policy
    Malformed { reason: String },
    /// Socket is broken - log and disconnect
    IoError { error: String },
}

/// Classify a transport read error into an actionable category.
pub(super) fn classify_read_error(e: TransportReadError) -> ReadErrorAction {
    match e {
        TransportReadError::EndOfStream => ReadErrorAction::EndOfStream,
        TransportReadError::Malformed(reason) => ReadErrorAction::Malformed { reason },
        other => ReadErrorAction::IoError {
            error: other.to_string(),
        },
    }
}
