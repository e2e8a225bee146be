//! # Test Signer Server
//!
//! 回答への署名発行と照合を提供するHTTPサーバー。
//!
//! ## API エンドポイント
//! - `GET /ping` — 死活確認
//! - `POST /test/sign` — 回答への署名発行（201）
//! - `POST /signature/verify` — 発行済み署名の照合
//!
//! ## 起動シーケンス
//! 1. 環境変数（と `.env`）から設定を読み込む
//! 2. DB設定があればPostgreSQLに接続、なければメモリ内ストア
//! 3. ルーターを構築し `0.0.0.0:SERVER_PORT` で待ち受け
//! 4. SIGINT / SIGTERMで処理中のリクエストを上限時間まで待ってから停止

mod config;
mod endpoints;
mod error;
mod middleware;
mod shutdown;

use std::net::SocketAddr;
use std::sync::Arc;

use signer_core::{MemoryStore, SignatureStore, SignaturesService};
use tracing_subscriber::EnvFilter;

use crate::config::{AppState, ServerConfig};

/// DB接続確立の上限時間
#[cfg(feature = "postgres")]
const DB_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG はプロセスの環境変数からのみ読む（`.env` より先に初期化するため）
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let store = open_store(&config).await?;

    let service = SignaturesService::new(store).with_store_timeout(config.store_timeout);
    let state = Arc::new(
        AppState::new(service, config.environment.clone(), config.version.clone())
            .with_request_timeout(config.request_timeout),
    );

    let app = endpoints::router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        %addr,
        environment = %config.environment,
        version = %config.version,
        "サーバーを起動します"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    shutdown::serve(
        listener,
        app,
        shutdown::shutdown_signal(),
        config.shutdown_timeout,
    )
    .await?;

    tracing::info!(requests = state.requests_served(), "サーバーを停止しました");
    Ok(())
}

/// 設定に応じて署名ストアを開く。
async fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn SignatureStore>> {
    match &config.database {
        #[cfg(feature = "postgres")]
        Some(db) => {
            tracing::info!(address = %db.address(), database = %db.name, "PostgreSQLに接続します");
            let store =
                signer_core::PostgresStore::connect_with(db.connect_options(), DB_CONNECT_TIMEOUT)
                    .await
                    .map_err(|e| anyhow::anyhow!("データベースに接続できません: {e}"))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => anyhow::bail!("postgres機能なしでビルドされたためDB設定は使用できません"),
        None => {
            tracing::warn!("DB設定が未設定です。メモリ内ストアで起動します（再起動で署名記録は失われます）");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
