//! Connection control handlers.

mod close;

pub use close::CloseHandler;
