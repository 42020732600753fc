//! Collaborator traits owned by the domain.
//!
//! The hub depends on two capabilities of the surrounding web application:
//! resolving a handshake to a logged-in user, and durably appending a chat
//! message. Implementations live in the infrastructure layer.

use async_trait::async_trait;

use super::{
    entity::{ChatMessage, HandshakeContext},
    error::StoreError,
    value_object::UserId,
};

/// Session lookup capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionLookup: Send + Sync {
    /// Resolve the handshake to the logged-in user, if the session is valid.
    async fn lookup_identity(&self, context: &HandshakeContext) -> Option<UserId>;
}

/// Message store capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably append a chat message.
    async fn append(&self, message: &ChatMessage) -> Result<(), StoreError>;
}
