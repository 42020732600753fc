//! WebSocket chat hub server implementation.

pub mod config;
mod error;
mod handler;
mod runner;
mod signal;
pub mod state;

pub use config::{ServerConfig, SessionSeed};
pub use error::ServerError;
pub use runner::{build_router, build_state, run, serve};
