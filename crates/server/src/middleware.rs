//! # リクエストログ
//!
//! 全ルートに適用するロギングミドルウェア。
//! 受付時にメソッド・通番・パス・接続元を、完了時にステータスと処理時間を記録する。

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::config::AppState;

pub async fn log_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = state.next_request_id();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    tracing::info!(request_id, %method, %path, %peer, "リクエストを受け付けました");
    tracing::debug!(request_id, headers = ?request.headers(), "リクエストヘッダー");

    let started = Instant::now();
    let response = next.run(request).await;

    tracing::info!(
        request_id,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "リクエストを処理しました"
    );

    response
}
