//! Builders for frames sent by the broker.

use serde_json::{Map, Value, json};

use crate::message::Message;

/// Event name used for error notifications.
pub const ERROR_EVENT: &str = "__error";

/// Status sent when a frame cannot be decoded or parsed.
pub const BAD_REQUEST: u16 = 400;

/// Build an error notification: `{"__error": {"status": 400, "text": "..."}}`.
pub fn error(status: u16, text: impl Into<String>) -> Message {
    let mut data = Map::with_capacity(2);
    data.insert("status".to_string(), json!(status));
    data.insert("text".to_string(), Value::String(text.into()));
    Message::new(ERROR_EVENT, data)
}

/// Error notification for an undecodable or unparseable frame.
pub fn bad_request() -> Message {
    error(BAD_REQUEST, "Bad request")
}

/// Build an event frame.
pub fn event(name: &str, data: Map<String, Value>) -> Message {
    Message::new(name, data)
}

/// Build an event frame with a single string field.
pub fn event_with(name: &str, key: &str, value: &str) -> Message {
    let mut data = Map::with_capacity(1);
    data.insert(key.to_string(), Value::String(value.to_string()));
    event(name, data)
}
