//! PostgreSQLストレージ
//!
//! 署名レコードを `user_signatures` テーブルに永続化する。
//! 起動時にテーブルが無ければ作成する。
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS user_signatures (
//!     user_id        TEXT        NOT NULL,
//!     signature      BYTEA       NOT NULL,
//!     answers        TEXT[]      NOT NULL,
//!     hash_timestamp TIMESTAMPTZ NOT NULL,
//!     PRIMARY KEY (user_id, signature)
//! );
//! ```

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use super::{SignatureStore, StorageError, UserSignature};

/// コネクションプールの最大接続数
const MAX_CONNECTIONS: u32 = 10;

/// PostgreSQL署名ストア
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// 接続文字列からプールを作成し、テーブルを用意する。
    pub async fn connect(
        database_url: &str,
        acquire_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let options = database_url
            .parse::<PgConnectOptions>()
            .map_err(|e| StorageError::Connection(format!("接続文字列が不正です: {e}")))?;
        Self::connect_with(options, acquire_timeout).await
    }

    /// 接続オプションからプールを作成し、テーブルを用意する。
    ///
    /// `acquire_timeout` は接続確立・プールからの取得の上限時間。
    pub async fn connect_with(
        options: PgConnectOptions,
        acquire_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::info!("PostgreSQLに接続しました");

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// 既存のプールから構築する。
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `user_signatures` テーブルを作成する（存在する場合は何もしない）。
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_signatures (
                user_id        TEXT        NOT NULL,
                signature      BYTEA       NOT NULL,
                answers        TEXT[]      NOT NULL,
                hash_timestamp TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (user_id, signature)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        tracing::info!("user_signaturesテーブルを確認しました");
        Ok(())
    }
}

/// sqlxのエラーをストレージエラーに変換する。
fn map_sqlx_error(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::AlreadyExists,
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Connection(e.to_string()),
        other => StorageError::Database(other.to_string()),
    }
}

fn record_from_row(row: &PgRow) -> Result<UserSignature, StorageError> {
    let column = |e: sqlx::Error| StorageError::Database(format!("カラムの読み取りに失敗: {e}"));
    Ok(UserSignature {
        user_id: row.try_get("user_id").map_err(column)?,
        signature: row.try_get("signature").map_err(column)?,
        answers: row.try_get("answers").map_err(column)?,
        hash_timestamp: row.try_get("hash_timestamp").map_err(column)?,
    })
}

#[async_trait::async_trait]
impl SignatureStore for PostgresStore {
    async fn write(&self, record: &UserSignature) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO user_signatures (user_id, signature, answers, hash_timestamp) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&record.user_id)
        .bind(&record.signature)
        .bind(&record.answers)
        .bind(record.hash_timestamp)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn read(&self, user_id: &str, signature: &[u8]) -> Result<UserSignature, StorageError> {
        let row = sqlx::query(
            "SELECT user_id, signature, answers, hash_timestamp FROM user_signatures \
             WHERE user_id = $1 AND signature = $2",
        )
        .bind(user_id)
        .bind(signature)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(StorageError::NotFound)?;

        record_from_row(&row)
    }
}
