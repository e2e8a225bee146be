//! # POST /signature/verify
//!
//! (回答者ID, 署名) の保存済みレコードを検索し、署名時の回答と時刻を返す。
//! RSA署名の暗号学的検証は行わない。

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use base64::Engine;
use signer_types::{VerifyRequest, VerifyResponse};

use super::{b64, json_body};
use crate::config::AppState;
use crate::error::ServerError;

pub async fn handle_verify(
    State(state): State<Arc<AppState>>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ServerError> {
    let request = json_body(body)?;

    let signature = b64()
        .decode(request.signature.trim())
        .map_err(|e| ServerError::BadRequest(format!("署名のBase64デコードに失敗: {e}")))?;

    let verified = state.service.verify(&request.jwt, &signature).await?;

    Ok(Json(VerifyResponse {
        answers: verified.answers,
        timestamp: verified.timestamp,
    }))
}
