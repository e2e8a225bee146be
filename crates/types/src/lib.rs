//! # Test Signer 共有型定義
//!
//! HTTP APIで送受信するJSONエンベロープをRust構造体として提供する。
//!
//! ## エンコーディング規則
//! - Base64（Standard, パディングあり）: バイナリデータ（署名）
//! - RFC 3339（UTC, サブ秒あり）: タイムスタンプ

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// POST /test/sign
// ---------------------------------------------------------------------------

/// 回答署名リクエスト。
///
/// `questions` は受け付けるが署名対象には含まれない。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRequest {
    /// 回答者の識別トークン（header.payload.signature 形式）
    pub jwt: String,
    /// 設問一覧
    #[serde(default)]
    pub questions: Vec<String>,
    /// 回答一覧（順序は署名対象に含まれる）
    pub answers: Vec<String>,
}

/// 回答署名レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignResponse {
    /// Base64エンコードされた署名
    pub signature: String,
}

// ---------------------------------------------------------------------------
// POST /signature/verify
// ---------------------------------------------------------------------------

/// 署名照合リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// 回答者の識別トークン
    pub jwt: String,
    /// Base64エンコードされた署名（/test/sign の返却値）
    pub signature: String,
}

/// 署名照合レスポンス。署名時に記録された回答と時刻を返す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// 署名時の回答一覧
    pub answers: Vec<String>,
    /// 署名時刻
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// GET /ping
// ---------------------------------------------------------------------------

/// 死活監視レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    /// 常に "available"
    pub status: String,
    pub system_info: SystemInfo,
}

/// サーバーの稼働環境情報。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// 稼働環境名（"development", "production" 等）
    pub environment: String,
    /// サーバーのバージョン
    pub version: String,
}

// ---------------------------------------------------------------------------
// エラー
// ---------------------------------------------------------------------------

/// エラーレスポンスの共通エンベロープ。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
