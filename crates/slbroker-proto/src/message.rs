//! The broker message envelope.

use serde_json::{Map, Value};

use crate::error::{ProtocolError, Result};

/// A single event exchanged with a client.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Event name (the single key of the envelope).
    pub event: String,
    /// Event payload.
    pub data: Map<String, Value>,
}

impl Message {
    /// Create a message from an event name and payload.
    pub fn new(event: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Parse a decoded JSON value into a message.
    ///
    /// A `null` payload is accepted as an empty object so that
    /// `{"close": null}` and `{"close": {}}` are equivalent.
    pub fn parse(value: Value) -> Result<Self> {
        let Value::Object(envelope) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        match envelope.len() {
            0 => return Err(ProtocolError::EmptyEnvelope),
            1 => {}
            n => return Err(ProtocolError::MultipleEvents(n)),
        }

        // len == 1 checked above
        let Some((event, data)) = envelope.into_iter().next() else {
            return Err(ProtocolError::EmptyEnvelope);
        };

        if event.is_empty() {
            return Err(ProtocolError::EmptyEventName);
        }

        let data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ProtocolError::InvalidData(event)),
        };

        Ok(Self { event, data })
    }

    /// Look up a string field in the payload.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Convert back into the envelope value.
    pub fn into_value(self) -> Value {
        let mut envelope = Map::with_capacity(1);
        envelope.insert(self.event, Value::Object(self.data));
        Value::Object(envelope)
    }

    /// Serialize into a text frame.
    pub fn to_frame(&self) -> String {
        self.clone().into_value().to_string()
    }
}

impl std::str::FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s).map_err(|_| ProtocolError::NotAnObject)?;
        Self::parse(value)
    }
}
