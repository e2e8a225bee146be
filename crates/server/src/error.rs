//! # サーバーエラー型
//!
//! サービス層のエラーをHTTPステータスと `{"error": ...}` ボディに変換する。

use axum::http::StatusCode;
use axum::Json;
use signer_core::ServiceError;
use signer_types::ErrorResponse;

/// サーバー障害時にクライアントへ返す汎用メッセージ
const INTERNAL_ERROR_MESSAGE: &str = "内部エラーが発生しました";

/// サーバーエラー型
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// リクエストボディ・パラメータの不正
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Service(ServiceError::MalformedToken(_)) => StatusCode::BAD_REQUEST,
            ServerError::Service(ServiceError::NotFound) => StatusCode::NOT_FOUND,
            ServerError::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "リクエスト処理に失敗しました");
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "リクエストを拒否しました");
            self.to_string()
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
