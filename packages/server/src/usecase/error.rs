//! UseCase 層のエラー定義

use thiserror::Error;

use crate::{
    domain::{ConnectionId, StoreError, UserId},
    infrastructure::dto::websocket::{DecodeError, ErrorCode},
};

/// ハンドシェイクを拒否する理由
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// Origin が許可リストにない
    #[error("origin '{0}' is not allowed")]
    OriginNotAllowed(String),

    /// セッションから会員を特定できない
    #[error("no logged-in session found for the handshake")]
    Unauthenticated,
}

/// アップグレード後、接続を Registry に登録できない
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmitError {
    /// 同じ接続 ID が既に登録されている
    #[error("connection '{0}' is already admitted")]
    DuplicateConnection(ConnectionId),
}

/// 受信メッセージ処理のエラー
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// フレームを ChatMessage に変換できない
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// 匿名接続からの送信
    #[error("anonymous connections cannot send messages")]
    Unauthenticated,

    /// senderId が接続の会員番号と一致しない
    #[error("sender {claimed} does not match the connection's user {actual}")]
    SenderMismatch { claimed: UserId, actual: UserId },

    /// 永続化に失敗した
    #[error("failed to persist message: {0}")]
    Persistence(#[from] StoreError),

    /// 送信フレームを作れない
    #[error("failed to encode outbound frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl BroadcastError {
    /// 送信元に通知するエラーコード
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Decode(DecodeError::Malformed(_)) => ErrorCode::DecodeError,
            Self::Decode(DecodeError::Invalid(_)) => ErrorCode::InvalidMessage,
            Self::Unauthenticated => ErrorCode::Unauthenticated,
            Self::SenderMismatch { .. } => ErrorCode::SenderMismatch,
            Self::Persistence(_) => ErrorCode::PersistenceFailed,
            Self::Encode(_) => ErrorCode::InternalError,
        }
    }
}
