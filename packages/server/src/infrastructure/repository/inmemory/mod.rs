//! In-memory collaborator implementations.

mod message;
mod session;

pub use message::{DEFAULT_MESSAGE_CAPACITY, InMemoryMessageStore};
pub use session::InMemorySessionStore;
