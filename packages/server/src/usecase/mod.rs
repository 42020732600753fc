//! UseCase 層
//!
//! ビジネスロジックを実装するレイヤー。
//! UI 層から呼び出され、Domain 層と接続 Registry を操作します。

pub mod admit_connection;
pub mod broadcast_message;
pub mod error;
pub mod evict_connection;
pub mod resolve_identity;

pub use admit_connection::AdmitConnectionUseCase;
pub use broadcast_message::BroadcastMessageUseCase;
pub use error::{AdmitError, BroadcastError, ConnectError};
pub use evict_connection::EvictConnectionUseCase;
pub use resolve_identity::{AnonymousPolicy, ResolveIdentityUseCase};
