//! # slbroker-proto
//!
//! Wire-level pieces of the Straylight WebSocket broker: the JSON message
//! envelope, reply frame builders, and a WebSocket transport that decodes
//! exactly one message per call.
//!
//! ## Envelope
//!
//! Every frame is a JSON object with a single key, the event name, whose
//! value is an object carrying the event data:
//!
//! ```rust
//! use slbroker_proto::Message;
//! use serde_json::json;
//!
//! let msg = Message::parse(json!({"subscribe": {"channel": "general"}})).unwrap();
//! assert_eq!(msg.event, "subscribe");
//! assert_eq!(msg.str_field("channel"), Some("general"));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod message;
pub mod reply;
#[cfg(feature = "tokio")]
pub mod transport;

pub use self::error::ProtocolError;
pub use self::message::Message;
#[cfg(feature = "tokio")]
pub use self::transport::{Transport, TransportReadError};
