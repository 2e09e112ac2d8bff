//! Messaging handlers.

mod broadcast;

pub use broadcast::BroadcastHandler;
