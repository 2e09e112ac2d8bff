//! Channel membership handlers.
//!
//! Handles `subscribe` and `unsubscribe`.

mod subscribe;
mod unsubscribe;

pub use subscribe::SubscribeHandler;
pub use unsubscribe::UnsubscribeHandler;
