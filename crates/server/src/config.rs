//! # サーバー設定・共有状態
//!
//! 環境変数からの設定読み込みとサーバーの共有状態の定義。

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{bail, Context};
use signer_core::{SignaturesService, DEFAULT_STORE_TIMEOUT};

/// `ENVIRONMENT` 未設定時の既定値
const DEFAULT_ENVIRONMENT: &str = "development";

/// 起動ディレクトリで読み込む環境変数ファイル
const DOTENV_FILE: &str = ".env";

/// `DB_ADDRESS` にポートがない場合の既定値
const DEFAULT_DB_PORT: u16 = 5432;

/// リクエスト1件あたりの処理時間の既定上限
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 停止シグナル受信後、処理中リクエストの完了を待つ既定上限
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL接続設定。4項目全てが揃った場合のみ有効。
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl DatabaseConfig {
    /// ログ表示用の `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// sqlxの接続オプション。各項目はURLを経由せずそのまま渡す。
    #[cfg(feature = "postgres")]
    pub fn connect_options(&self) -> signer_core::PgConnectOptions {
        signer_core::PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

/// `host`、`host:port`、`[v6]:port` 形式のアドレスを分解する。
fn split_address(address: &str) -> anyhow::Result<(String, u16)> {
    let parse_port = |raw: &str| {
        raw.parse::<u16>()
            .with_context(|| format!("DB_ADDRESSのポートが不正です: {address}"))
    };

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .with_context(|| format!("DB_ADDRESSの形式が不正です: {address}"))?;
        match tail.strip_prefix(':') {
            Some(port) => (host, parse_port(port)?),
            None if tail.is_empty() => (host, DEFAULT_DB_PORT),
            None => bail!("DB_ADDRESSの形式が不正です: {address}"),
        }
    } else {
        match address.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => (host, parse_port(port)?),
            _ => (address, DEFAULT_DB_PORT),
        }
    };

    if host.is_empty() {
        bail!("DB_ADDRESSのホストが空です: {address}");
    }
    Ok((host.to_string(), port))
}

/// サーバー設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// 待ち受けポート（0.0.0.0にバインド）
    pub port: u16,
    /// `/ping` で返す実行環境名
    pub environment: String,
    /// `/ping` で返すバージョン
    pub version: String,
    /// Noneの場合はメモリ内ストアで起動する
    pub database: Option<DatabaseConfig>,
    /// ストレージ呼び出し1回あたりのタイムアウト
    pub store_timeout: Duration,
    /// リクエスト1件あたりのタイムアウト（超過時は408）
    pub request_timeout: Duration,
    /// 停止時に処理中リクエストを待つ上限
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    /// プロセスの環境変数と `.env` から読み込む。
    ///
    /// 同じキーはプロセスの環境変数を優先する。`.env` がなければ環境変数のみを使う。
    pub fn from_env() -> anyhow::Result<Self> {
        let file = read_dotenv(Path::new(DOTENV_FILE))?;
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file.get(key).cloned()))
    }

    /// 任意の参照関数から読み込む。空文字列は未設定として扱う。
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = get("SERVER_PORT")
            .context("SERVER_PORTが未設定です")?
            .trim()
            .parse::<u16>()
            .context("SERVER_PORTはポート番号である必要があります")?;

        let environment = get("ENVIRONMENT").unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        let version = get("VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

        let seconds = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            let Some(raw) = get(key) else {
                return Ok(default);
            };
            let secs = raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{key}は秒数である必要があります"))?;
            if secs == 0 {
                bail!("{key}は1以上である必要があります");
            }
            Ok(Duration::from_secs(secs))
        };
        let store_timeout = seconds("STORE_TIMEOUT_SECS", DEFAULT_STORE_TIMEOUT)?;
        let request_timeout = seconds("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT)?;
        let shutdown_timeout = seconds("SHUTDOWN_TIMEOUT_SECS", DEFAULT_SHUTDOWN_TIMEOUT)?;

        let db_keys = ["DB_ADDRESS", "DB_NAME", "DB_USER", "DB_PASSWORD"];
        let db_values: Vec<Option<String>> = db_keys.iter().map(|k| get(k)).collect();
        let database = match db_values.as_slice() {
            [Some(address), Some(name), Some(user), Some(password)] => {
                let (host, port) = split_address(address.trim())?;
                Some(DatabaseConfig {
                    host,
                    port,
                    name: name.clone(),
                    user: user.clone(),
                    password: password.clone(),
                })
            }
            values if values.iter().all(Option::is_none) => None,
            values => {
                let missing: Vec<&str> = db_keys
                    .iter()
                    .zip(values)
                    .filter(|(_, v)| v.is_none())
                    .map(|(k, _)| *k)
                    .collect();
                bail!("データベース設定が不完全です（未設定: {}）", missing.join(", "));
            }
        };

        Ok(Self {
            port,
            environment,
            version,
            database,
            store_timeout,
            request_timeout,
            shutdown_timeout,
        })
    }
}

/// `.env` ファイルを読む。ファイルがない場合は空を返す。
fn read_dotenv(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "環境変数ファイルがありません");
            return Ok(HashMap::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("{}を開けません", path.display()));
        }
    };

    let vars = parse_dotenv(file).with_context(|| format!("{}の解析に失敗しました", path.display()))?;
    tracing::info!(path = %path.display(), keys = vars.len(), "環境変数ファイルを読み込みました");
    Ok(vars)
}

/// `.env` 形式のテキストをキーと値に分解する。
fn parse_dotenv<R: std::io::Read>(reader: R) -> Result<HashMap<String, String>, dotenvy::Error> {
    dotenvy::from_read_iter(reader).collect()
}

/// サーバーの共有状態。
pub struct AppState {
    /// 署名・照合サービス
    pub service: SignaturesService,
    pub environment: String,
    pub version: String,
    /// ログ相関用のリクエスト通番
    pub request_counter: AtomicU64,
    /// リクエスト1件あたりのタイムアウト
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(service: SignaturesService, environment: String, version: String) -> Self {
        Self {
            service,
            environment,
            version,
            request_counter: AtomicU64::new(0),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// 次のリクエスト番号（1始まり）を払い出す。
    pub fn next_request_id(&self) -> u64 {
        self.request_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// これまでに受け付けたリクエスト数
    pub fn requests_served(&self) -> u64 {
        self.request_counter.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("SERVER_PORT", "8080")])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.environment, "development");
        assert_eq!(config.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(config.database, None);
        assert_eq!(config.store_timeout, Duration::from_secs(3));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_full_config() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SERVER_PORT", "9000"),
            ("ENVIRONMENT", "production"),
            ("VERSION", "1.2.3"),
            ("DB_ADDRESS", "db:5432"),
            ("DB_NAME", "signatures"),
            ("DB_USER", "signer"),
            ("DB_PASSWORD", "secret"),
            ("STORE_TIMEOUT_SECS", "10"),
            ("REQUEST_TIMEOUT_SECS", "15"),
            ("SHUTDOWN_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.environment, "production");
        assert_eq!(config.version, "1.2.3");
        assert_eq!(config.store_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        let db = config.database.unwrap();
        assert_eq!(db.host, "db");
        assert_eq!(db.port, 5432);
        assert_eq!(db.name, "signatures");
        assert_eq!(db.address(), "db:5432");
        assert!(!format!("{db:?}").contains("secret"));
    }

    fn config_with_db(address: &str, password: &str) -> anyhow::Result<ServerConfig> {
        ServerConfig::from_lookup(lookup(&[
            ("SERVER_PORT", "8080"),
            ("DB_ADDRESS", address),
            ("DB_NAME", "signatures"),
            ("DB_USER", "signer"),
            ("DB_PASSWORD", password),
        ]))
    }

    /// URL予約文字を含むパスワードでも接続先・資格情報が崩れないことを確認
    #[test]
    fn test_password_with_reserved_characters() {
        let db = config_with_db("db:6543", "p@ss/w#rd?:x").unwrap().database.unwrap();
        assert_eq!(db.host, "db");
        assert_eq!(db.port, 6543);
        assert_eq!(db.user, "signer");
        assert_eq!(db.password, "p@ss/w#rd?:x");

        #[cfg(feature = "postgres")]
        {
            let options = db.connect_options();
            assert_eq!(options.get_host(), "db");
            assert_eq!(options.get_port(), 6543);
            assert_eq!(options.get_username(), "signer");
            assert_eq!(options.get_database(), Some("signatures"));
        }
    }

    #[test]
    fn test_database_address_forms() {
        let db = config_with_db("db.internal", "secret").unwrap().database.unwrap();
        assert_eq!((db.host.as_str(), db.port), ("db.internal", 5432));

        let db = config_with_db("[::1]:5433", "secret").unwrap().database.unwrap();
        assert_eq!((db.host.as_str(), db.port), ("::1", 5433));

        assert!(config_with_db("db:port", "secret").is_err());
        assert!(config_with_db(":5432", "secret").is_err());
    }

    #[test]
    fn test_missing_or_invalid_port_is_rejected() {
        assert!(ServerConfig::from_lookup(lookup(&[])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("SERVER_PORT", "")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("SERVER_PORT", "http")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("SERVER_PORT", "70000")])).is_err());
    }

    /// DB設定が一部だけの場合はエラーになり、未設定の項目名が含まれることを確認
    #[test]
    fn test_partial_database_config_is_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[
            ("SERVER_PORT", "8080"),
            ("DB_ADDRESS", "db:5432"),
            ("DB_USER", "signer"),
        ]))
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("DB_NAME"), "{message}");
        assert!(message.contains("DB_PASSWORD"), "{message}");
        assert!(!message.contains("DB_USER"), "{message}");
    }

    #[test]
    fn test_store_timeout_must_be_positive() {
        assert!(ServerConfig::from_lookup(lookup(&[
            ("SERVER_PORT", "8080"),
            ("STORE_TIMEOUT_SECS", "0"),
        ]))
        .is_err());
        assert!(ServerConfig::from_lookup(lookup(&[
            ("SERVER_PORT", "8080"),
            ("STORE_TIMEOUT_SECS", "soon"),
        ]))
        .is_err());
        assert!(ServerConfig::from_lookup(lookup(&[
            ("SERVER_PORT", "8080"),
            ("REQUEST_TIMEOUT_SECS", "0"),
        ]))
        .is_err());
        assert!(ServerConfig::from_lookup(lookup(&[
            ("SERVER_PORT", "8080"),
            ("SHUTDOWN_TIMEOUT_SECS", "-1"),
        ]))
        .is_err());
    }

    /// `.env` の値は環境変数が未設定のキーにだけ使われることを確認
    #[test]
    fn test_dotenv_values_fill_unset_keys() {
        let text = "# local settings\nSERVER_PORT=8081\nENVIRONMENT=\"staging\"\nDB_PASSWORD='p@ss w#rd'\n";
        let file = parse_dotenv(text.as_bytes()).unwrap();
        assert_eq!(file.get("DB_PASSWORD").map(String::as_str), Some("p@ss w#rd"));

        let process = lookup(&[("ENVIRONMENT", "production")]);
        let config =
            ServerConfig::from_lookup(|key| process(key).or_else(|| file.get(key).cloned())).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.environment, "production");
    }

    #[test]
    fn test_malformed_dotenv_is_rejected() {
        assert!(parse_dotenv("SERVER_PORT=8080\nTHIS IS NOT VALID\n".as_bytes()).is_err());
    }

    #[test]
    fn test_missing_dotenv_is_empty() {
        let vars = read_dotenv(Path::new("definitely-missing-signer.env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn test_request_ids_are_sequential() {
        let state = AppState::new(
            SignaturesService::new(std::sync::Arc::new(signer_core::MemoryStore::new())),
            "test".into(),
            "0.0.0".into(),
        );
        assert_eq!(state.next_request_id(), 1);
        assert_eq!(state.next_request_id(), 2);
        assert_eq!(state.requests_served(), 2);
    }
}
