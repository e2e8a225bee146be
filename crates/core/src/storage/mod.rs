//! # 署名レコードストレージ
//!
//! 署名レコードの永続化を抽象化するトレイトと実装。
//!
//! 実装:
//! - `memory` — メモリ内HashMap（開発・テスト用、再起動で消える）
//! - `postgres` — PostgreSQL（`postgres` feature）

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
#[cfg(feature = "postgres")]
pub use sqlx::postgres::PgConnectOptions;

use std::time::Duration;

use chrono::{DateTime, Utc};

/// 署名レコード。
///
/// 署名1回ごとに1件作成され、以後更新されない。
/// (user_id, signature) の組が自然キーとなる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSignature {
    /// 回答者ID
    pub user_id: String,
    /// 署名バイト列
    pub signature: Vec<u8>,
    /// 署名対象の回答一覧
    pub answers: Vec<String>,
    /// 署名時刻
    pub hash_timestamp: DateTime<Utc>,
}

/// ストレージ操作のエラー型
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// (user_id, signature) に一致するレコードがない
    #[error("署名レコードが見つかりません")]
    NotFound,
    /// 同じ (user_id, signature) のレコードが既に存在する
    #[error("署名レコードが既に存在します")]
    AlreadyExists,
    /// データベースエラー
    #[error("データベースエラー: {0}")]
    Database(String),
    /// 接続エラー
    #[error("データベース接続エラー: {0}")]
    Connection(String),
    /// 時間内に完了しなかった
    #[error("ストレージ操作がタイムアウトしました（{0:?}）")]
    Timeout(Duration),
}

/// 署名レコードストレージの抽象インターフェース。
///
/// 実装はスレッドセーフであること。競合する読み書きの直列化は実装側の責務。
#[async_trait::async_trait]
pub trait SignatureStore: Send + Sync {
    /// レコードを保存する。成功を返した時点で永続化されていること。
    async fn write(&self, record: &UserSignature) -> Result<(), StorageError>;

    /// (user_id, signature) の完全一致でレコードを取得する。
    async fn read(&self, user_id: &str, signature: &[u8]) -> Result<UserSignature, StorageError>;
}
