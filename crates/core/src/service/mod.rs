//! # 署名・照合サービス
//!
//! ## 署名フロー
//! 1. トークンから回答者IDを抽出する
//! 2. 現在時刻（マイクロ秒に切り捨て）を署名時刻とする
//! 3. 使い捨てRSA鍵で (回答, 回答者ID, 時刻) に署名する
//! 4. 署名レコードを保存する
//! 5. 手順3の署名を返す（ストアから読み直さない）
//!
//! ## 照合フロー
//! 1. トークンから回答者IDを抽出する
//! 2. (回答者ID, 署名) でレコードを検索する
//! 3. 記録された回答と時刻を返す
//!
//! ストレージ呼び出しは全て `store_timeout` で打ち切る。リトライはしない。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use signer_crypto::{AnswerSigner, EphemeralRsaSigner};

use crate::error::ServiceError;
use crate::identity::{IdentityExtractor, UnverifiedJwtExtractor};
use crate::storage::{SignatureStore, StorageError, UserSignature};


/// ストレージ呼び出しのタイムアウト既定値
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// 照合成功時に返す、署名時の回答と時刻
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAnswers {
    pub answers: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// 署名・照合サービス。
///
/// 呼び出し間で可変状態を持たず、`Clone` して各リクエストで共有できる。
#[derive(Clone)]
pub struct SignaturesService {
    identity: Arc<dyn IdentityExtractor>,
    signer: Arc<dyn AnswerSigner>,
    store: Arc<dyn SignatureStore>,
    store_timeout: Duration,
}

impl SignaturesService {
    /// 既定のExtractor（署名検証なし）と使い捨てRSA署名器で構築する。
    pub fn new(store: Arc<dyn SignatureStore>) -> Self {
        Self {
            identity: Arc::new(UnverifiedJwtExtractor::new()),
            signer: Arc::new(EphemeralRsaSigner::new()),
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_identity_extractor(mut self, identity: Arc<dyn IdentityExtractor>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_signer(mut self, signer: Arc<dyn AnswerSigner>) -> Self {
        self.signer = signer;
        self
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// 現在時刻で回答に署名し、レコードを保存して署名を返す。
    pub async fn sign(&self, token: &str, answers: Vec<String>) -> Result<Vec<u8>, ServiceError> {
        self.sign_at(token, answers, Utc::now()).await
    }

    /// 指定時刻で回答に署名する。
    ///
    /// 時刻はマイクロ秒に切り捨ててから署名・保存する。
    pub async fn sign_at(
        &self,
        token: &str,
        answers: Vec<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<u8>, ServiceError> {
        let user_id = self.identity.extract(token)?;
        let hash_timestamp = timestamp.trunc_subsecs(6);

        // RSA鍵生成はCPUを占有するためブロッキングプールで実行する
        let signer = Arc::clone(&self.signer);
        let (user_id, answers, signature) = tokio::task::spawn_blocking(move || {
            signer
                .sign(&user_id, &answers, hash_timestamp)
                .map(|signature| (user_id, answers, signature))
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("署名タスクが異常終了しました: {e}")))??;

        let record = UserSignature {
            user_id,
            signature,
            answers,
            hash_timestamp,
        };
        self.bounded(self.store.write(&record)).await?;

        tracing::info!(
            user_id = %record.user_id,
            answers = record.answers.len(),
            signature = %fingerprint(&record.signature),
            "回答に署名しました"
        );

        Ok(record.signature)
    }

    /// 発行済み署名を照合し、署名時の回答と時刻を返す。
    ///
    /// 署名の暗号学的検証は行わない。(回答者ID, 署名) のレコードが存在すれば成功。
    pub async fn verify(
        &self,
        token: &str,
        signature: &[u8],
    ) -> Result<VerifiedAnswers, ServiceError> {
        let user_id = self.identity.extract(token)?;

        let record = self.bounded(self.store.read(&user_id, signature)).await?;

        tracing::debug!(
            user_id = %record.user_id,
            signature = %fingerprint(signature),
            "署名レコードを照合しました"
        );

        Ok(VerifiedAnswers {
            answers: record.answers,
            timestamp: record.hash_timestamp,
        })
    }

    /// ストレージ操作を `store_timeout` で打ち切る。
    ///
    /// 打ち切りは応答待ちを止めるだけで、ストア側の処理は取り消さない。
    /// 書き込みがストアでコミットされた後に期限を迎えた場合、呼び出し元には
    /// `StorageError::Timeout` が返る一方でレコードは残る。この署名は
    /// クライアントに返らないため照合に使われることはない。
    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        tokio::time::timeout(self.store_timeout, op)
            .await
            .map_err(|_| StorageError::Timeout(self.store_timeout))?
    }
}

/// ログ用の署名先頭8バイト（16進）
fn fingerprint(signature: &[u8]) -> String {
    hex::encode(&signature[..signature.len().min(8)])
}
