//! Utilities shared by the chatting hub binaries and tests.

pub mod logger;
pub mod time;
