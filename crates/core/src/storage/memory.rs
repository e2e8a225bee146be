//! メモリ内ストレージ
//!
//! データベースなしで動かすための実装。再起動でデータは失われる。

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{SignatureStore, StorageError, UserSignature};

/// (user_id, signature) をキーとするメモリ内ストア
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(String, Vec<u8>), UserSignature>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存済みレコード数
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait::async_trait]
impl SignatureStore for MemoryStore {
    async fn write(&self, record: &UserSignature) -> Result<(), StorageError> {
        let key = (record.user_id.clone(), record.signature.clone());
        let mut records = self.records.write().await;
        if records.contains_key(&key) {
            return Err(StorageError::AlreadyExists);
        }
        records.insert(key, record.clone());
        Ok(())
    }

    async fn read(&self, user_id: &str, signature: &[u8]) -> Result<UserSignature, StorageError> {
        let records = self.records.read().await;
        records
            .get(&(user_id.to_string(), signature.to_vec()))
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(user_id: &str, signature: &[u8]) -> UserSignature {
        UserSignature {
            user_id: user_id.to_string(),
            signature: signature.to_vec(),
            answers: vec!["answer1".to_string(), "answer2".to_string()],
            hash_timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = MemoryStore::new();
        let rec = record("jose", b"sig-1");
        store.write(&rec).await.unwrap();

        let found = store.read("jose", b"sig-1").await.unwrap();
        assert_eq!(found, rec);
        assert_eq!(store.len().await, 1);
    }

    /// ユーザーと署名の両方が一致しなければ見つからないことを確認
    #[tokio::test]
    async fn test_read_requires_exact_pair() {
        let store = MemoryStore::new();
        store.write(&record("jose", b"sig-1")).await.unwrap();

        assert!(matches!(store.read("maria", b"sig-1").await, Err(StorageError::NotFound)));
        assert!(matches!(store.read("jose", b"sig-2").await, Err(StorageError::NotFound)));
        assert!(matches!(store.read("jose", b"sig-").await, Err(StorageError::NotFound)));
    }

    /// 同一ユーザーの複数レコードが共存できることを確認
    #[tokio::test]
    async fn test_multiple_records_per_user() {
        let store = MemoryStore::new();
        store.write(&record("jose", b"sig-1")).await.unwrap();
        store.write(&record("jose", b"sig-2")).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    /// レコードは上書きできないことを確認
    #[tokio::test]
    async fn test_records_are_immutable() {
        let store = MemoryStore::new();
        let original = record("jose", b"sig-1");
        store.write(&original).await.unwrap();

        let mut replacement = original.clone();
        replacement.answers = vec!["changed".to_string()];
        assert!(matches!(
            store.write(&replacement).await,
            Err(StorageError::AlreadyExists)
        ));

        assert_eq!(store.read("jose", b"sig-1").await.unwrap(), original);
    }
}
