//! # GET /ping

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use signer_types::{PingResponse, SystemInfo};

use crate::config::AppState;

/// 死活確認。実行環境名とバージョンを返す。
pub async fn handle_ping(State(state): State<Arc<AppState>>) -> Json<PingResponse> {
    Json(PingResponse {
        status: "available".to_string(),
        system_info: SystemInfo {
            environment: state.environment.clone(),
            version: state.version.clone(),
        },
    })
}
