//! # サービス層エラー型
//!
//! 下位モジュールのエラーをクライアント起因とサーバー起因に分けて束ねる。

use signer_crypto::CryptoError;

use crate::identity::IdentityError;
use crate::storage::StorageError;

/// 署名・照合サービスのエラー型
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// トークンの形式・デコード不正（クライアント起因）
    #[error("トークンが不正です: {0}")]
    MalformedToken(#[from] IdentityError),
    /// 署名処理の失敗（サーバー起因）
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// 照合対象のレコードがない（クライアント起因）
    #[error("署名レコードが見つかりません")]
    NotFound,
    /// ストレージの失敗（サーバー起因）
    #[error(transparent)]
    Store(StorageError),
    /// ブロッキングタスクの異常終了
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => ServiceError::NotFound,
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    /// クライアント入力に起因するエラーか
    pub fn is_client_error(&self) -> bool {
        matches!(self, ServiceError::MalformedToken(_) | ServiceError::NotFound)
    }
}
