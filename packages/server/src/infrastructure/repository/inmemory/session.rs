//! InMemory Session Store 実装
//!
//! ドメイン層が定義する SessionLookup trait の具体的な実装。
//! ログイン済みセッションのトークンと会員番号の対応を HashMap で保持します。
//! 本来のセッションストアは周辺の Web アプリケーションが持つため、
//! ここではサーバー起動時の設定やテストから投入します。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{HandshakeContext, SessionLookup, SessionToken, UserId};

/// インメモリ Session Store 実装
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    /// セッショントークン → ログイン中の会員番号
    sessions: RwLock<HashMap<SessionToken, UserId>>,
}

impl InMemorySessionStore {
    /// 空の InMemorySessionStore を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 既存のセッション一覧から作成
    pub fn with_sessions(sessions: impl IntoIterator<Item = (SessionToken, UserId)>) -> Self {
        Self {
            sessions: RwLock::new(sessions.into_iter().collect()),
        }
    }

    /// ログインを記録する。既存のトークンは上書きされる
    pub async fn insert(&self, token: SessionToken, user_id: UserId) {
        self.sessions.write().await.insert(token, user_id);
    }

    /// ログアウトを記録する
    pub async fn remove(&self, token: &SessionToken) -> Option<UserId> {
        self.sessions.write().await.remove(token)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionLookup for InMemorySessionStore {
    async fn lookup_identity(&self, context: &HandshakeContext) -> Option<UserId> {
        let token = context.session_token.as_ref()?;
        self.sessions.read().await.get(token).copied()
    }
}
