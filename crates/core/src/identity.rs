//! # 回答者IDの抽出
//!
//! `header.payload.signature` 形式のトークンからpayloadを取り出し、
//! 回答者IDのクレームを読み出す。
//!
//! トークンの署名・有効期限は検証しない。呼び出し元が提示したクレームを
//! そのまま信用する。検証付きの実装に差し替える場合は
//! [`IdentityExtractor`] を実装すればよく、サービス層は変更不要。

use base64::Engine;

/// 回答者IDを格納するクレーム名の既定値
pub const DEFAULT_USER_ID_CLAIM: &str = "userid";

/// トークン解析のエラー型。いずれもクライアント入力の誤りを表す。
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// セグメント数が3でない
    #[error("トークンの形式が不正です: セグメント数 {0}（期待値 3）")]
    Format(usize),
    /// payloadセグメントがBase64URL（パディングなし）でない
    #[error("payloadのBase64URLデコードに失敗: {0}")]
    Decode(#[from] base64::DecodeError),
    /// payloadから回答者IDを読み出せない
    #[error("payloadのクレームが不正です: {0}")]
    Claims(String),
}

/// 回答者ID抽出のトレイト。
pub trait IdentityExtractor: Send + Sync {
    /// トークンから回答者IDを抽出する。
    fn extract(&self, token: &str) -> Result<String, IdentityError>;
}

/// 署名検証を行わずにpayloadのクレームだけを読むExtractor。
#[derive(Debug, Clone)]
pub struct UnverifiedJwtExtractor {
    claim: String,
}

impl UnverifiedJwtExtractor {
    pub fn new() -> Self {
        Self {
            claim: DEFAULT_USER_ID_CLAIM.to_string(),
        }
    }

    /// 回答者IDを読み出すクレーム名を変更する。
    pub fn with_claim(mut self, claim: impl Into<String>) -> Self {
        self.claim = claim.into();
        self
    }
}

impl Default for UnverifiedJwtExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityExtractor for UnverifiedJwtExtractor {
    fn extract(&self, token: &str) -> Result<String, IdentityError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(IdentityError::Format(segments.len()));
        }

        let claims_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(segments[1])?;

        let claims: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(&claims_bytes)
                .map_err(|e| IdentityError::Claims(e.to_string()))?;

        let user_id = claims
            .get(&self.claim)
            .ok_or_else(|| IdentityError::Claims(format!("{}クレームがありません", self.claim)))?
            .as_str()
            .ok_or_else(|| IdentityError::Claims(format!("{}クレームが文字列ではありません", self.claim)))?;

        // 空文字列もそのまま回答者IDとして扱う
        Ok(user_id.to_string())
    }
}

/// 既定の `userid` クレームから回答者IDを抽出する。
pub fn extract_user_id(token: &str) -> Result<String, IdentityError> {
    UnverifiedJwtExtractor::new().extract(token)
}
