//! Connection token generation.

use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Opaque identifier assigned to a connection at acceptance time.
///
/// Format: 32 lowercase hex characters (UUIDv4, simple form).
/// Example: "9f1c0e5a2b7d4c3e8a6f0b1d2c3e4f5a"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionToken(String);

impl ConnectionToken {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ConnectionToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
