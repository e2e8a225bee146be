//! # POST /test/sign
//!
//! トークンの回答者IDと回答に署名し、署名レコードを保存する。
//! `questions` は受け付けるが署名対象には含めない。

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use base64::Engine;
use signer_types::{SignRequest, SignResponse};

use super::{b64, json_body};
use crate::config::AppState;
use crate::error::ServerError;

/// 署名を発行し、201とBase64の署名を返す。
pub async fn handle_sign(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SignRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignResponse>), ServerError> {
    let request = json_body(body)?;
    tracing::debug!(
        questions = request.questions.len(),
        answers = request.answers.len(),
        "署名リクエスト"
    );

    let signature = state.service.sign(&request.jwt, request.answers).await?;

    Ok((
        StatusCode::CREATED,
        Json(SignResponse {
            signature: b64().encode(signature),
        }),
    ))
}
