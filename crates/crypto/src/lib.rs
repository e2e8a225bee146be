//! # Test Signer 暗号処理
//!
//! 回答者・回答・時刻を結び付ける署名を生成する。
//!
//! ## 暗号アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | 署名対象の直列化 | JSON（フィールド順固定） |
//! | ハッシュ | SHA-256 |
//! | 署名 | RSA-2048 / PKCS#1 v1.5 |
//!
//! ## 使い捨て鍵ペア
//! 署名のたびに新しいRSA鍵ペアを生成し、署名後に破棄する。公開鍵はどこにも
//! 残らないため、発行した署名を暗号学的に検証する手段は存在しない。
//! 照合は保存済みレコードの (user_id, signature) 一致で行う。

use chrono::{DateTime, Utc};
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// 使い捨てRSA鍵のビット長
pub const RSA_KEY_BITS: usize = 2048;

/// 暗号処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// 署名対象の直列化エラー
    #[error("署名対象のシリアライズに失敗しました: {0}")]
    Serialization(#[from] serde_json::Error),
    /// RSA鍵ペア生成エラー（乱数源の枯渇を含む）
    #[error("RSA鍵ペアの生成に失敗しました: {0}")]
    KeyGeneration(String),
    /// RSA署名エラー
    #[error("RSA署名に失敗しました: {0}")]
    Signing(String),
}

/// SHA-256ハッシュ計算。
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

// ---------------------------------------------------------------------------
// 署名対象
// ---------------------------------------------------------------------------

/// 署名対象ペイロード。
///
/// フィールドの宣言順がそのままJSONのキー順になる。同じ値からは常に同じ
/// バイト列が得られ、ダイジェストはこの構造体の純粋関数となる。
#[derive(Debug, Clone, Serialize)]
pub struct SignablePayload<'a> {
    pub answers: &'a [String],
    #[serde(rename = "userID")]
    pub user_id: &'a str,
    pub timestamp: DateTime<Utc>,
}

impl<'a> SignablePayload<'a> {
    pub fn new(user_id: &'a str, answers: &'a [String], timestamp: DateTime<Utc>) -> Self {
        Self {
            answers,
            user_id,
            timestamp,
        }
    }

    /// 正規化済みのJSONバイト列を返す。
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// 正規化済みJSONのSHA-256ダイジェストを返す。
    pub fn digest(&self) -> Result<[u8; 32], CryptoError> {
        Ok(sha256(&self.to_bytes()?))
    }
}

// ---------------------------------------------------------------------------
// 署名器
// ---------------------------------------------------------------------------

/// 回答署名器のトレイト。
///
/// サービス層はこのトレイト越しに署名を依頼する。
pub trait AnswerSigner: Send + Sync {
    /// 回答者・回答・時刻を結び付けた署名バイト列を返す。
    fn sign(
        &self,
        user_id: &str,
        answers: &[String],
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<u8>, CryptoError>;
}

/// 呼び出しごとにRSA鍵ペアを生成して署名する署名器。
///
/// 鍵は署名後に破棄され、同一入力でも毎回異なる署名になる。
#[derive(Debug, Clone)]
pub struct EphemeralRsaSigner {
    bits: usize,
}

impl EphemeralRsaSigner {
    pub fn new() -> Self {
        Self { bits: RSA_KEY_BITS }
    }
}

impl Default for EphemeralRsaSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerSigner for EphemeralRsaSigner {
    fn sign(
        &self,
        user_id: &str,
        answers: &[String],
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<u8>, CryptoError> {
        let digest = SignablePayload::new(user_id, answers, timestamp).digest()?;

        let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, self.bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

        rsa_sign_digest(&private_key, &digest)
        // private_keyはここでドロップされる
    }
}

/// RSASSA-PKCS1-v1_5 (SHA-256) でダイジェストに署名する。
pub fn rsa_sign_digest(
    private_key: &RsaPrivateKey,
    digest: &[u8; 32],
) -> Result<Vec<u8>, CryptoError> {
    private_key
        .sign(Pkcs1v15Sign::new::<Sha256>(), digest)
        .map_err(|e| CryptoError::Signing(e.to_string()))
}
