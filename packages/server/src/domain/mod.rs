//! Domain layer for the chatting hub.
//!
//! This module contains business logic that is independent of
//! data transfer objects (DTOs) and infrastructure concerns.

pub mod entity;
pub mod error;
pub mod factory;
pub mod repository;
pub mod value_object;

pub use entity::{
    ChatMessage, Connection, ConnectionState, HandshakeContext, Identity, StampedChatMessage,
};
pub use error::{ConnectionStateError, StoreError, ValueObjectError};
pub use factory::ConnectionIdFactory;
pub use repository::{MessageStore, SessionLookup};
pub use value_object::{ConnectionId, MessageContent, RoomId, SessionToken, Timestamp, UserId};

#[cfg(test)]
pub use repository::{MockMessageStore, MockSessionLookup};
