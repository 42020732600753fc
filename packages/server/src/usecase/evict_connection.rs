//! UseCase: 接続の削除処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - EvictConnectionUseCase::execute() メソッド
//! - 切断時に Registry から接続が一度だけ削除されること
//!
//! ### なぜこのテストが必要か
//! - 切断の原因（クライアント、ネットワーク、配信失敗、サーバー）にかかわらず、
//!   Registry に古いエントリが残ってはならない
//!
//! ### どのような状況を想定しているか
//! - 正常系：登録済み接続の削除
//! - エッジケース：配信失敗で既に削除された接続の再削除

use std::sync::Arc;

use crate::{domain::ConnectionId, infrastructure::ConnectionRegistry};

/// 接続削除のユースケース
pub struct EvictConnectionUseCase {
    registry: Arc<ConnectionRegistry>,
}

impl EvictConnectionUseCase {
    /// 新しい EvictConnectionUseCase を作成
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// 接続削除を実行
    ///
    /// # Returns
    ///
    /// この呼び出しで削除した場合は `true`、既に削除済みなら `false`
    pub async fn execute(&self, connection_id: ConnectionId) -> bool {
        let removed = self.registry.evict(connection_id).await;
        if removed {
            tracing::info!(connection_id = %connection_id, "connection evicted");
        } else {
            tracing::debug!(connection_id = %connection_id, "connection was already evicted");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Identity, UserId},
        usecase::AdmitConnectionUseCase,
    };
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_evict_connection_success() {
        // テスト項目: 登録済みの接続を削除できる
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let admit = AdmitConnectionUseCase::new(registry.clone());
        let usecase = EvictConnectionUseCase::new(registry.clone());
        let (tx1, _rx1) = mpsc::channel(8);
        let (tx2, _rx2) = mpsc::channel(8);
        let alice = admit
            .execute(Identity::User(UserId::new(1).unwrap()), tx1)
            .await
            .unwrap();
        admit
            .execute(Identity::User(UserId::new(2).unwrap()), tx2)
            .await
            .unwrap();

        // when (操作):
        let removed = usecase.execute(alice.id()).await;

        // then (期待する結果):
        assert!(removed);
        assert_eq!(registry.len().await, 1);
        assert!(!registry.contains(alice.id()).await);
    }

    #[tokio::test]
    async fn test_evict_twice_has_same_effect_as_once() {
        // テスト項目: 二回目の削除は何も変えない
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let admit = AdmitConnectionUseCase::new(registry.clone());
        let usecase = EvictConnectionUseCase::new(registry.clone());
        let (tx, _rx) = mpsc::channel(8);
        let handle = admit.execute(Identity::Anonymous, tx).await.unwrap();

        // when (操作):
        let first = usecase.execute(handle.id()).await;
        let second = usecase.execute(handle.id()).await;

        // then (期待する結果):
        assert!(first);
        assert!(!second);
        assert_eq!(registry.len().await, 0);
    }
}
