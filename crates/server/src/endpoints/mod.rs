//! # エンドポイント
//!
//! - `GET /ping` — 死活確認
//! - `POST /test/sign` — 回答への署名発行
//! - `POST /signature/verify` — 発行済み署名の照合

pub mod ping;
pub mod sign;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::timeout::TimeoutLayer;

use crate::config::AppState;
use crate::error::ServerError;
use crate::middleware::log_requests;

pub use ping::handle_ping;
pub use sign::handle_sign;
pub use verify::handle_verify;

/// Base64エンジン（Standard）
pub(crate) fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// JSONボディの取り出し。パース失敗は400として返す。
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    body.map(|Json(inner)| inner)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

/// 全ルートとミドルウェアを組み立てる。
///
/// `request_timeout` を超えたリクエストは408で打ち切る。ログは打ち切りも含めて記録する。
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(handle_ping))
        .route("/test/sign", post(handle_sign))
        .route("/signature/verify", post(handle_verify))
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            log_requests,
        ))
        .with_state(state)
}
