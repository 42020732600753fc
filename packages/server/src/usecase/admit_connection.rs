//! UseCase: 接続の登録処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - AdmitConnectionUseCase::execute() メソッド
//! - identity を付けた接続が Registry に登録されること
//!
//! ### どのような状況を想定しているか
//! - 正常系：会員の接続、匿名接続
//! - エッジケース：同じ会員の複数タブ（別々の接続として登録される）

use std::sync::Arc;

use chatting_shared::time::get_jst_timestamp;
use tokio::sync::mpsc;

use crate::{
    domain::{Connection, ConnectionIdFactory, Identity, Timestamp},
    infrastructure::{ConnectionHandle, ConnectionRegistry},
};

use super::error::AdmitError;

/// 接続登録のユースケース
pub struct AdmitConnectionUseCase {
    registry: Arc<ConnectionRegistry>,
}

impl AdmitConnectionUseCase {
    /// 新しい AdmitConnectionUseCase を作成
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// 接続登録を実行
    ///
    /// # Arguments
    ///
    /// * `identity` - ハンドシェイクで解決した identity
    /// * `sender` - この接続の送信キュー
    ///
    /// # Returns
    ///
    /// * `Ok(ConnectionHandle)` - 登録された接続
    /// * `Err(AdmitError)` - 同じ接続 ID が既に登録されている
    pub async fn execute(
        &self,
        identity: Identity,
        sender: mpsc::Sender<String>,
    ) -> Result<ConnectionHandle, AdmitError> {
        let connection = Connection::new(
            ConnectionIdFactory::generate(),
            identity,
            Timestamp::new(get_jst_timestamp()),
        );
        let handle = ConnectionHandle::new(connection, sender);
        self.admit(handle).await
    }

    async fn admit(&self, handle: ConnectionHandle) -> Result<ConnectionHandle, AdmitError> {
        if !self.registry.admit(handle.clone()).await {
            return Err(AdmitError::DuplicateConnection(handle.id()));
        }

        tracing::info!(
            connection_id = %handle.id(),
            user_id = ?handle.identity().user_id(),
            "connection admitted"
        );
        Ok(handle)
    }
}
