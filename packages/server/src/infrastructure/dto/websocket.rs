//! WebSocket message DTOs for the chatting hub.
//!
//! Chat frames are camelCase JSON objects. Inbound frames also accept the
//! field names used by the web application's chatting page (`senderNo`,
//! `targetNo`, `chattingRoomNo`, `messageContent`).

use chatting_shared::time::format_send_time;
use serde::{Deserialize, Deserializer, Serialize, de};
use thiserror::Error;

use crate::domain::{
    ChatMessage, MessageContent, RoomId, StampedChatMessage, UserId, ValueObjectError,
};

/// Errors while turning a text frame into a `ChatMessage`
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, or missing/mistyped fields
    #[error("malformed chat frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Well-formed JSON with values the domain rejects
    #[error("invalid chat message: {0}")]
    Invalid(#[from] ValueObjectError),
}

/// Chat message as sent by a client. `sendTime`, if present, is ignored.
///
/// Ids may be JSON numbers or numeric strings; the chatting page sends strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundChatFrame {
    #[serde(alias = "senderNo", deserialize_with = "number_or_numeric_string")]
    pub sender_id: i64,
    #[serde(alias = "targetNo", deserialize_with = "number_or_numeric_string")]
    pub addressee_id: i64,
    #[serde(alias = "chattingRoomNo", deserialize_with = "number_or_numeric_string")]
    pub room_id: i64,
    #[serde(alias = "messageContent")]
    pub content: String,
}

impl InboundChatFrame {
    /// Parse a raw text frame.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Validate into the domain model.
    pub fn into_domain(self) -> Result<ChatMessage, DecodeError> {
        Ok(ChatMessage::new(
            UserId::try_from(self.sender_id)?,
            UserId::try_from(self.addressee_id)?,
            RoomId::try_from(self.room_id)?,
            MessageContent::try_from(self.content)?,
        ))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    String(String),
}

fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected a numeric id, got \"{s}\""))),
    }
}

/// Decode and validate a raw text frame in one step.
pub fn decode_chat_message(raw: &str) -> Result<ChatMessage, DecodeError> {
    InboundChatFrame::decode(raw)?.into_domain()
}

/// Chat message as delivered to the sender's and addressee's connections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundChatFrame {
    pub sender_id: i64,
    pub addressee_id: i64,
    pub room_id: i64,
    pub content: String,
    /// `yyyy.MM.dd HH:mm`, JST
    pub send_time: String,
}

impl From<&StampedChatMessage> for OutboundChatFrame {
    fn from(stamped: &StampedChatMessage) -> Self {
        let message = &stamped.message;
        Self {
            sender_id: message.sender.value(),
            addressee_id: message.addressee.value(),
            room_id: message.room.value(),
            content: message.content.as_str().to_string(),
            send_time: format_send_time(stamped.sent_at.value()),
        }
    }
}

/// Message type tag of non-chat frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    Error,
}

/// Reason code carried by an error frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    DecodeError,
    InvalidMessage,
    Unauthenticated,
    SenderMismatch,
    PersistenceFailed,
    UnsupportedFrame,
    /// The message was stored but could not be delivered
    InternalError,
}

/// Protocol error notification, sent to the offending connection only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub r#type: MessageType,
    pub code: ErrorCode,
    pub reason: String,
}

impl ErrorFrame {
    pub fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self {
            r#type: MessageType::Error,
            code,
            reason: reason.into(),
        }
    }
}
