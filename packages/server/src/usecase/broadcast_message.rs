//! UseCase: メッセージ送信処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - BroadcastMessageUseCase::handle_inbound() / execute() メソッド
//! - 受信フレームのデコード、永続化、送信時刻の付与、送信者と宛先の接続への配信
//!
//! ### なぜこのテストが必要か
//! - 永続化に成功したメッセージだけが配信されることを保証する
//! - 配信先は送信者と宛先の会員の接続のみ（全接続へのブロードキャストではない）
//! - 1 接続の配信失敗が他の接続への配信を止めないことを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：C1(1), C2(2), C3(3) で 1 → 2 のメッセージ
//! - 異常系：デコード失敗、永続化失敗、送信者のなりすまし、匿名接続からの送信
//! - エッジケース：宛先の接続が既に切れている、同じ会員の複数タブ

use std::sync::Arc;

use chatting_shared::time::get_jst_timestamp;

use crate::{
    domain::{ChatMessage, Identity, MessageStore, Timestamp},
    infrastructure::{
        ConnectionHandle, ConnectionRegistry, DeliveryReport,
        dto::websocket::{ErrorFrame, OutboundChatFrame, decode_chat_message},
    },
};

use super::error::BroadcastError;

/// メッセージ送信のユースケース
pub struct BroadcastMessageUseCase {
    /// 接続中の全接続
    registry: Arc<ConnectionRegistry>,
    /// メッセージ保存先（周辺 Web アプリケーションの抽象化）
    store: Arc<dyn MessageStore>,
}

impl BroadcastMessageUseCase {
    /// 新しい BroadcastMessageUseCase を作成
    pub fn new(registry: Arc<ConnectionRegistry>, store: Arc<dyn MessageStore>) -> Self {
        Self { registry, store }
    }

    /// 受信したテキストフレームを処理する
    ///
    /// 失敗した場合は送信元の接続にだけエラーフレームを返す。
    pub async fn handle_inbound(
        &self,
        raw_frame: &str,
        from: &ConnectionHandle,
    ) -> Result<DeliveryReport, BroadcastError> {
        let result = match decode_chat_message(raw_frame) {
            Ok(message) => self.execute(message, from.identity()).await,
            Err(e) => Err(e.into()),
        };

        if let Err(error) = &result {
            tracing::warn!(
                connection_id = %from.id(),
                error = %error,
                "inbound message dropped"
            );
            notify_error(from, error);
        }
        result
    }

    /// メッセージ送信を実行
    ///
    /// # Arguments
    ///
    /// * `message` - デコード済みのメッセージ（Domain Model）
    /// * `origin` - 送信元の接続の identity
    ///
    /// # Returns
    ///
    /// * `Ok(DeliveryReport)` - 配信結果
    /// * `Err(BroadcastError)` - 永続化前に拒否された、または永続化に失敗した
    pub async fn execute(
        &self,
        message: ChatMessage,
        origin: Identity,
    ) -> Result<DeliveryReport, BroadcastError> {
        // 1. 送信者が接続の会員と一致するか
        match origin {
            Identity::Anonymous => return Err(BroadcastError::Unauthenticated),
            Identity::User(actual) if actual != message.sender => {
                return Err(BroadcastError::SenderMismatch {
                    claimed: message.sender,
                    actual,
                });
            }
            Identity::User(_) => {}
        }

        // 2. 永続化
        self.store.append(&message).await?;

        // 3. 永続化に成功した時点の時刻を付与
        let stamped = message.stamp(Timestamp::new(get_jst_timestamp()));
        let frame = serde_json::to_string(&OutboundChatFrame::from(&stamped))?;

        // 4. 送信者と宛先の接続に配信
        let report = self
            .registry
            .for_each_matching(
                |connection| stamped.message.is_participant(&connection.identity),
                |handle| handle.try_send(frame.clone()),
            )
            .await;

        tracing::info!(
            sender = %stamped.message.sender,
            addressee = %stamped.message.addressee,
            room = %stamped.message.room,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "message broadcast"
        );
        Ok(report)
    }
}

fn notify_error(to: &ConnectionHandle, error: &BroadcastError) {
    let frame = ErrorFrame::new(error.error_code(), error.to_string());
    match serde_json::to_string(&frame) {
        Ok(json) => {
            if let Err(e) = to.try_send(json) {
                tracing::debug!(
                    connection_id = %to.id(),
                    error = %e,
                    "could not notify connection of protocol error"
                );
            }
        }
        Err(e) => tracing::error!("failed to encode error frame: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{MockMessageStore, StoreError, UserId},
        infrastructure::{SendError, dto::websocket::ErrorCode},
        usecase::AdmitConnectionUseCase,
    };
    use tokio::sync::mpsc;

    const HI_FROM_1_TO_2: &str = r#"{"senderId":1,"addresseeId":2,"roomId":8,"content":"hi"}"#;

    struct Client {
        handle: ConnectionHandle,
        rx: mpsc::Receiver<String>,
    }

    impl Client {
        fn drain(&mut self) -> Vec<serde_json::Value> {
            let mut frames = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                frames.push(serde_json::from_str(&frame).unwrap());
            }
            frames
        }
    }

    async fn connect(registry: &Arc<ConnectionRegistry>, identity: Identity) -> Client {
        let (tx, rx) = mpsc::channel(16);
        let handle = AdmitConnectionUseCase::new(registry.clone())
            .execute(identity, tx)
            .await
            .unwrap();
        Client { handle, rx }
    }

    fn user(id: i64) -> Identity {
        Identity::User(UserId::new(id).unwrap())
    }

    fn store_succeeding(times: usize) -> Arc<MockMessageStore> {
        let mut store = MockMessageStore::new();
        store.expect_append().times(times).returning(|_| Ok(()));
        Arc::new(store)
    }

    fn store_never_called() -> Arc<MockMessageStore> {
        let mut store = MockMessageStore::new();
        store.expect_append().times(0);
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_broadcast_to_sender_and_addressee_only() {
        // テスト項目: 送信者と宛先の接続だけに、sendTime 付きのメッセージが 1 件ずつ届く
        // given (前提条件): C1(user 1), C2(user 2), C3(user 3)
        let registry = Arc::new(ConnectionRegistry::new());
        let mut c1 = connect(&registry, user(1)).await;
        let mut c2 = connect(&registry, user(2)).await;
        let mut c3 = connect(&registry, user(3)).await;
        let usecase = BroadcastMessageUseCase::new(registry.clone(), store_succeeding(1));

        // when (操作): user 1 が user 2 に送信
        let report = usecase
            .handle_inbound(HI_FROM_1_TO_2, &c1.handle)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(report.attempted(), 2);
        for frames in [c1.drain(), c2.drain()] {
            assert_eq!(frames.len(), 1);
            let frame = &frames[0];
            assert_eq!(frame["senderId"], 1);
            assert_eq!(frame["addresseeId"], 2);
            assert_eq!(frame["roomId"], 8);
            assert_eq!(frame["content"], "hi");
            assert!(frame["sendTime"].is_string());
        }
        assert!(c3.drain().is_empty());
    }

    #[tokio::test]
    async fn test_exactly_k_delivery_attempts() {
        // テスト項目: N 接続中 k 接続が送信者か宛先の場合、配信はちょうど k 件
        // given (前提条件): user 1 が 2 タブ、user 2 が 3 タブ、その他 4 接続
        let registry = Arc::new(ConnectionRegistry::new());
        let mut clients = Vec::new();
        for identity in [
            user(1),
            user(1),
            user(2),
            user(2),
            user(2),
            user(3),
            user(4),
            user(5),
            Identity::Anonymous,
        ] {
            clients.push(connect(&registry, identity).await);
        }
        let usecase = BroadcastMessageUseCase::new(registry.clone(), store_succeeding(1));

        // when (操作):
        let report = usecase
            .handle_inbound(HI_FROM_1_TO_2, &clients[0].handle)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(report.attempted(), 5);
        let received: Vec<usize> = clients.iter_mut().map(|c| c.drain().len()).collect();
        assert_eq!(received, vec![1, 1, 1, 1, 1, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_persistence_failure_delivers_nothing() {
        // テスト項目: 永続化に失敗した場合、どの接続にもチャットメッセージは届かない
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let mut c1 = connect(&registry, user(1)).await;
        let mut c2 = connect(&registry, user(2)).await;
        let mut c3 = connect(&registry, user(3)).await;
        let mut store = MockMessageStore::new();
        store
            .expect_append()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("db down".to_string())));
        let usecase = BroadcastMessageUseCase::new(registry.clone(), Arc::new(store));

        // when (操作):
        let result = usecase.handle_inbound(HI_FROM_1_TO_2, &c1.handle).await;

        // then (期待する結果): 送信元にだけエラーが通知される
        assert!(matches!(result, Err(BroadcastError::Persistence(_))));
        let c1_frames = c1.drain();
        assert_eq!(c1_frames.len(), 1);
        assert_eq!(c1_frames[0]["type"], "error");
        assert_eq!(c1_frames[0]["code"], "persistence-failed");
        assert!(c1_frames[0].get("sendTime").is_none());
        assert!(c2.drain().is_empty());
        assert!(c3.drain().is_empty());
    }

    #[tokio::test]
    async fn test_decode_error_keeps_connection_and_later_messages_flow() {
        // テスト項目: デコードエラーでは接続は削除されず、その後の正しいメッセージは配信される
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let mut c1 = connect(&registry, user(1)).await;
        let mut c2 = connect(&registry, user(2)).await;
        let usecase = BroadcastMessageUseCase::new(registry.clone(), store_succeeding(1));

        // when (操作):
        let bad = usecase.handle_inbound("{not json", &c1.handle).await;
        let good = usecase.handle_inbound(HI_FROM_1_TO_2, &c1.handle).await;

        // then (期待する結果):
        assert!(matches!(bad, Err(BroadcastError::Decode(_))));
        assert!(good.is_ok());
        assert!(registry.contains(c1.handle.id()).await);

        let c1_frames = c1.drain();
        assert_eq!(c1_frames.len(), 2);
        assert_eq!(c1_frames[0]["code"], "decode-error");
        assert_eq!(c1_frames[1]["content"], "hi");
        assert_eq!(c2.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_values_are_not_persisted() {
        // テスト項目: 値が不正なメッセージは永続化されず invalid-message が通知される
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let mut c1 = connect(&registry, user(1)).await;
        let usecase = BroadcastMessageUseCase::new(registry.clone(), store_never_called());

        // when (操作):
        let raw = r#"{"senderId":1,"addresseeId":2,"roomId":8,"content":""}"#;
        let result = usecase.handle_inbound(raw, &c1.handle).await;

        // then (期待する結果):
        assert!(result.is_err());
        assert_eq!(c1.drain()[0]["code"], "invalid-message");
    }

    #[tokio::test]
    async fn test_sender_mismatch_is_rejected() {
        // テスト項目: 接続の会員と異なる senderId のメッセージは拒否される
        // given (前提条件): user 3 の接続が user 1 になりすます
        let registry = Arc::new(ConnectionRegistry::new());
        let mut c1 = connect(&registry, user(1)).await;
        let mut c3 = connect(&registry, user(3)).await;
        let usecase = BroadcastMessageUseCase::new(registry.clone(), store_never_called());

        // when (操作):
        let result = usecase.handle_inbound(HI_FROM_1_TO_2, &c3.handle).await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(BroadcastError::SenderMismatch { .. })
        ));
        assert_eq!(c3.drain()[0]["code"], "sender-mismatch");
        assert!(c1.drain().is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_connection_cannot_send() {
        // テスト項目: 匿名接続からのメッセージは永続化されない
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let mut anonymous = connect(&registry, Identity::Anonymous).await;
        let mut c2 = connect(&registry, user(2)).await;
        let usecase = BroadcastMessageUseCase::new(registry.clone(), store_never_called());

        // when (操作):
        let result = usecase.handle_inbound(HI_FROM_1_TO_2, &anonymous.handle).await;

        // then (期待する結果):
        assert!(matches!(result, Err(BroadcastError::Unauthenticated)));
        assert_eq!(anonymous.drain()[0]["code"], "unauthenticated");
        assert!(c2.drain().is_empty());
    }

    #[tokio::test]
    async fn test_dead_addressee_is_evicted_without_failing_broadcast() {
        // テスト項目: 宛先の接続が切れていても配信全体は失敗せず、その接続は削除される
        // given (前提条件): C2 の受信側が既に閉じている
        let registry = Arc::new(ConnectionRegistry::new());
        let mut c1 = connect(&registry, user(1)).await;
        let c2 = connect(&registry, user(2)).await;
        let mut c2_other_tab = connect(&registry, user(2)).await;
        let c2_id = c2.handle.id();
        drop(c2.rx);
        let usecase = BroadcastMessageUseCase::new(registry.clone(), store_succeeding(1));

        // when (操作):
        let report = usecase
            .handle_inbound(HI_FROM_1_TO_2, &c1.handle)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(report.delivered.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].connection_id, c2_id);
        assert_eq!(report.failed[0].error, SendError::Disconnected);
        assert!(!registry.contains(c2_id).await);
        assert_eq!(c1.drain().len(), 1);
        assert_eq!(c2_other_tab.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_persisted_message_matches_decoded_frame() {
        // テスト項目: 永続化されるのはデコードしたメッセージそのもの
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let c1 = connect(&registry, user(1)).await;
        let mut store = MockMessageStore::new();
        store
            .expect_append()
            .withf(|m| {
                m.sender.value() == 1
                    && m.addressee.value() == 2
                    && m.room.value() == 8
                    && m.content.as_str() == "hi"
            })
            .times(1)
            .returning(|_| Ok(()));
        let usecase = BroadcastMessageUseCase::new(registry.clone(), Arc::new(store));

        // when (操作):
        let result = usecase.handle_inbound(HI_FROM_1_TO_2, &c1.handle).await;

        // then (期待する結果):
        assert!(result.is_ok());
    }

    #[test]
    fn test_error_codes() {
        // テスト項目: エラーの種類ごとに通知コードが決まる
        // then (期待する結果):
        assert_eq!(
            BroadcastError::Unauthenticated.error_code(),
            ErrorCode::Unauthenticated
        );
        assert_eq!(
            BroadcastError::Persistence(StoreError::CapacityExceeded { capacity: 1 }).error_code(),
            ErrorCode::PersistenceFailed
        );
    }

    #[test]
    fn test_encode_failure_is_not_reported_as_persistence_failure() {
        // テスト項目: 保存後の送信フレーム作成の失敗は persistence-failed として通知されない
        // given (前提条件):
        let encode_error = serde_json::from_str::<i64>("not a number").unwrap_err();

        // when (操作):
        let code = BroadcastError::Encode(encode_error).error_code();

        // then (期待する結果):
        assert_eq!(code, ErrorCode::InternalError);
        assert_eq!(
            serde_json::to_value(ErrorFrame::new(code, "encode failed")).unwrap()["code"],
            "internal-error"
        );
    }
}
