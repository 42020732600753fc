//! Core domain models for the chatting hub.

use serde::{Deserialize, Serialize};

use super::{
    error::ConnectionStateError,
    value_object::{ConnectionId, MessageContent, RoomId, SessionToken, Timestamp, UserId},
};

/// Who is on the other end of a connection, fixed at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    /// Logged-in member of the web application
    User(UserId),
    /// Admitted without a resolvable session; never a delivery target
    Anonymous,
}

impl Identity {
    /// The tagged user, if any.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Anonymous => None,
        }
    }

    /// Whether this identity is the given user. Always false for anonymous.
    pub fn matches(&self, user_id: UserId) -> bool {
        self.user_id() == Some(user_id)
    }
}

impl From<Option<UserId>> for Identity {
    fn from(value: Option<UserId>) -> Self {
        value.map_or(Self::Anonymous, Self::User)
    }
}

/// What the upgrade request carried, as seen by the identity resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeContext {
    /// Session token of an existing web session
    pub session_token: Option<SessionToken>,
    /// `Origin` header of the upgrade request
    pub origin: Option<String>,
}

impl HandshakeContext {
    pub fn new(session_token: Option<SessionToken>, origin: Option<String>) -> Self {
        Self {
            session_token,
            origin,
        }
    }
}

/// Lifecycle of a single physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    /// Move to `Open`. Only valid from `Connecting`.
    pub fn open(self) -> Result<Self, ConnectionStateError> {
        match self {
            Self::Connecting => Ok(Self::Open),
            from => Err(ConnectionStateError {
                from,
                to: Self::Open,
            }),
        }
    }

    /// Move to `Closed`.
    ///
    /// Returns `None` when the connection was already closed, so callers run
    /// their close side effects once.
    pub fn close(self) -> Option<Self> {
        match self {
            Self::Closed => None,
            Self::Connecting | Self::Open => Some(Self::Closed),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// An admitted connection as the domain sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Connection identifier
    pub id: ConnectionId,
    /// Identity tagged at admission
    pub identity: Identity,
    /// Timestamp when the connection was admitted
    pub connected_at: Timestamp,
}

impl Connection {
    pub fn new(id: ConnectionId, identity: Identity, connected_at: Timestamp) -> Self {
        Self {
            id,
            identity,
            connected_at,
        }
    }
}

/// A decoded chat message, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender's user ID
    pub sender: UserId,
    /// Addressee's user ID
    pub addressee: UserId,
    /// Chatting room the message belongs to
    pub room: RoomId,
    /// Message content
    pub content: MessageContent,
}

impl ChatMessage {
    /// Create a new chat message
    pub fn new(sender: UserId, addressee: UserId, room: RoomId, content: MessageContent) -> Self {
        Self {
            sender,
            addressee,
            room,
            content,
        }
    }

    /// Whether the given identity is one of the two participants.
    pub fn is_participant(&self, identity: &Identity) -> bool {
        identity.matches(self.sender) || identity.matches(self.addressee)
    }

    /// Attach the send time. Only done once the store accepted the message.
    pub fn stamp(self, sent_at: Timestamp) -> StampedChatMessage {
        StampedChatMessage {
            message: self,
            sent_at,
        }
    }
}

/// A persisted chat message with its server-assigned send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedChatMessage {
    pub message: ChatMessage,
    pub sent_at: Timestamp,
}
