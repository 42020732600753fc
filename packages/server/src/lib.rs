//! Identity-aware WebSocket chat hub.
//!
//! Each connection is tagged with the logged-in member resolved at the
//! handshake. A chat message is persisted first, then delivered to the
//! connections of its sender and addressee only.

pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// Re-export entry points
pub use ui::{ServerConfig, ServerError, run};
