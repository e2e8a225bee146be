//! # Test Signer Core
//!
//! 回答への署名発行と、発行済み署名の照合を実装する。
//!
//! ## 処理フロー
//! - 署名: トークンから回答者IDを抽出 → 回答と時刻を署名 → レコードを保存 → 署名を返す
//! - 照合: トークンから回答者IDを抽出 → (回答者ID, 署名) でレコードを検索 → 回答と時刻を返す
//!
//! 照合は保存済みレコードの一致確認であり、署名の暗号学的検証は行わない。

pub mod error;
pub mod identity;
pub mod service;
pub mod storage;

pub use error::ServiceError;
pub use identity::{extract_user_id, IdentityError, IdentityExtractor, UnverifiedJwtExtractor};
pub use service::{SignaturesService, VerifiedAnswers, DEFAULT_STORE_TIMEOUT};
pub use storage::{MemoryStore, SignatureStore, StorageError, UserSignature};

#[cfg(feature = "postgres")]
pub use storage::{PgConnectOptions, PostgresStore};
