//! Integration test common infrastructure.
//!
//! Provides an in-process broker with a bound gateway and a WebSocket
//! client for asserting on JSON event flows.

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::TestServer;
