//! UseCase: ハンドシェイク時の会員特定
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ResolveIdentityUseCase::execute() メソッド
//! - Origin の許可判定と、セッションからの会員番号の解決
//!
//! ### なぜこのテストが必要か
//! - 以降の配信先の判定はすべてここで付けた identity に依存する
//! - セッションなしの接続を拒否するか匿名で受け入れるかは設定で切り替わり、
//!   二つの経路が混ざらないことを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：ログイン済みセッション
//! - 異常系：セッションなし（Reject / Admit）、許可されていない Origin
//! - エッジケース：末尾スラッシュ付きの Origin 設定、ワイルドカード

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{HandshakeContext, Identity, SessionLookup};

use super::error::ConnectError;

/// セッションを解決できない接続の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AnonymousPolicy {
    /// ハンドシェイクを 401 で拒否する
    #[default]
    Reject,
    /// 匿名接続として受け入れ、どの配信対象にも含めない
    Admit,
}

/// 会員特定のユースケース
pub struct ResolveIdentityUseCase {
    /// セッション照会（周辺 Web アプリケーションの抽象化）
    session_lookup: Arc<dyn SessionLookup>,
    /// セッションなし接続の扱い
    policy: AnonymousPolicy,
    /// 許可する Origin パターン（空なら全て許可、小文字・末尾スラッシュなしに正規化済み）
    allowed_origins: Vec<String>,
}

impl ResolveIdentityUseCase {
    /// 新しい ResolveIdentityUseCase を作成
    pub fn new(
        session_lookup: Arc<dyn SessionLookup>,
        policy: AnonymousPolicy,
        allowed_origins: Vec<String>,
    ) -> Self {
        Self {
            session_lookup,
            policy,
            allowed_origins: allowed_origins
                .iter()
                .map(|pattern| normalize_origin(pattern))
                .collect(),
        }
    }

    /// 会員特定を実行
    ///
    /// # Returns
    ///
    /// * `Ok(Identity)` - 接続に付ける identity
    /// * `Err(ConnectError)` - ハンドシェイクを拒否する
    pub async fn execute(&self, context: &HandshakeContext) -> Result<Identity, ConnectError> {
        // 1. Origin チェック
        if !self.is_origin_allowed(context.origin.as_deref()) {
            let origin = context.origin.clone().unwrap_or_default();
            tracing::warn!(origin = %origin, "handshake from disallowed origin");
            return Err(ConnectError::OriginNotAllowed(origin));
        }

        // 2. セッションから会員番号を解決
        match self.session_lookup.lookup_identity(context).await {
            Some(user_id) => Ok(Identity::User(user_id)),
            None => match self.policy {
                AnonymousPolicy::Reject => {
                    tracing::warn!("handshake without a logged-in session rejected");
                    Err(ConnectError::Unauthenticated)
                }
                AnonymousPolicy::Admit => {
                    tracing::info!("handshake without a logged-in session admitted as anonymous");
                    Ok(Identity::Anonymous)
                }
            },
        }
    }

    fn is_origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        let Some(origin) = origin else {
            return false;
        };
        let origin = normalize_origin(origin);
        self.allowed_origins
            .iter()
            .any(|pattern| origin_matches(pattern, &origin))
    }
}

/// Scheme and host compare case-insensitively, so both sides are lowercased once.
fn normalize_origin(origin: &str) -> String {
    origin.trim_end_matches('/').to_ascii_lowercase()
}

/// `*` matches any run of characters; at most one `*` is honoured.
/// Both arguments must already be normalized.
fn origin_matches(pattern: &str, origin: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            origin.len() >= prefix.len() + suffix.len()
                && origin.starts_with(prefix)
                && origin.ends_with(suffix)
        }
        None => pattern == origin,
    }
}
