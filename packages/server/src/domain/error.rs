//! Domain layer error definitions.

use thiserror::Error;

use super::entity::ConnectionState;

/// Errors related to Value Objects validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    /// UserId must be a positive integer
    #[error("UserId must be positive (got {0})")]
    UserIdNotPositive(i64),

    /// RoomId must be a positive integer
    #[error("RoomId must be positive (got {0})")]
    RoomIdNotPositive(i64),

    /// ConnectionId invalid format error (not a valid UUID format)
    #[error("ConnectionId must be a valid UUID format (got: {0})")]
    ConnectionIdInvalidFormat(String),

    /// SessionToken validation error
    #[error("SessionToken cannot be empty")]
    SessionTokenEmpty,

    /// SessionToken too long error
    #[error("SessionToken cannot exceed {max} characters (got {actual})")]
    SessionTokenTooLong { max: usize, actual: usize },

    /// MessageContent validation error
    #[error("MessageContent cannot be empty")]
    MessageContentEmpty,

    /// MessageContent too long error
    #[error("MessageContent cannot exceed {max} characters (got {actual})")]
    MessageContentTooLong { max: usize, actual: usize },
}

/// Invalid connection lifecycle transition
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid connection state transition: {from:?} -> {to:?}")]
pub struct ConnectionStateError {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// Errors reported by the message store collaborator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store is full
    #[error("message store capacity exceeded: maximum {capacity} messages")]
    CapacityExceeded { capacity: usize },

    /// The store could not be reached
    #[error("message store unavailable: {0}")]
    Unavailable(String),
}
