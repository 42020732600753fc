//! InMemory Message Store 実装
//!
//! ドメイン層が定義する MessageStore trait の具体的な実装。
//! Vec をインメモリ DB として使用します。上限件数を超える書き込みは拒否されます。

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ChatMessage, MessageStore, RoomId, StoreError};

/// Default maximum number of messages kept in memory
pub const DEFAULT_MESSAGE_CAPACITY: usize = 10_000;

/// インメモリ Message Store 実装
#[derive(Debug)]
pub struct InMemoryMessageStore {
    /// 保存済みメッセージ（保存順）
    messages: Mutex<Vec<ChatMessage>>,
    /// 保存できる最大件数
    capacity: usize,
}

impl InMemoryMessageStore {
    /// デフォルト容量で作成
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MESSAGE_CAPACITY)
    }

    /// 容量を指定して作成
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// 指定したルームのメッセージを保存順に取得
    pub async fn messages_in_room(&self, room: RoomId) -> Vec<ChatMessage> {
        let messages = self.messages.lock().await;
        messages.iter().filter(|m| m.room == room).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let mut messages = self.messages.lock().await;
        if messages.len() >= self.capacity {
            return Err(StoreError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        messages.push(message.clone());
        Ok(())
    }
}
