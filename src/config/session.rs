//! Per-session settings.

use serde::Deserialize;

/// What a session does with a frame that cannot be decoded or parsed.
///
/// Both policies notify the client with a `400 Bad request` error frame.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Drop the frame and keep the session open.
    #[default]
    Skip,
    /// Close the session.
    Disconnect,
}

/// Settings applied to every session of a vhost.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    /// Handling of malformed payloads.
    #[serde(default)]
    pub malformed_payload: MalformedPolicy,
    /// Capacity of each connection's outbound queue, in frames.
    #[serde(default = "default_outgoing_queue")]
    pub outgoing_queue: usize,
}

fn default_outgoing_queue() -> usize {
    256
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            malformed_payload: MalformedPolicy::default(),
            outgoing_queue: default_outgoing_queue(),
        }
    }
}
