//! User accounts and permissions.

use std::fmt;
use std::num::NonZeroU32;
use std::ops::BitOr;

/// Access level of a user account.
///
/// A bit set that can never be zero. Unknown bits are preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission(NonZeroU32);

impl Permission {
    /// May subscribe to channels.
    pub const READ: Permission = Permission(NonZeroU32::new(1).unwrap());
    /// May broadcast to channels.
    pub const WRITE: Permission = Permission(NonZeroU32::new(2).unwrap());
    /// May create channels on demand.
    pub const MANAGE: Permission = Permission(NonZeroU32::new(4).unwrap());

    /// Build a permission from raw bits. Returns `None` for zero.
    pub fn new(bits: u32) -> Option<Self> {
        NonZeroU32::new(bits).map(Self)
    }

    /// Raw bits.
    pub fn bits(self) -> u32 {
        self.0.get()
    }

    /// Check if every bit of `other` is granted.
    pub fn contains(self, other: Permission) -> bool {
        self.bits() & other.bits() == other.bits()
    }
}

impl BitOr for Permission {
    type Output = Permission;

    fn bitor(self, rhs: Self) -> Self::Output {
        // Both operands are non-zero, so is their union.
        Permission(self.0 | rhs.0)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// A configured user account within a vhost.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub secret: String,
    pub permission: Permission,
}

impl User {
    /// Create a new user.
    pub fn new(name: String, secret: String, permission: Permission) -> Self {
        Self {
            name,
            secret,
            permission,
        }
    }

    /// Check if this user is granted `required`.
    pub fn can(&self, required: Permission) -> bool {
        self.permission.contains(required)
    }
}

// Secrets stay out of logs.
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .field("permission", &self.permission)
            .finish()
    }
}
