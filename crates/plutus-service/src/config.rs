//! Service configuration.

use std::str::FromStr;

use plutus_engine::EngineConfig;

/// Which ledger store the binary opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-process store; state is lost on restart.
    Memory,
    /// `RocksDB` under `data_dir`.
    Rocks,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rocks" | "rocksdb" => Ok(Self::Rocks),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/plutus").
    pub data_dir: String,

    /// Ledger store (default: memory).
    pub storage_backend: StorageBackend,

    /// Redis URL for idempotency keys and the balance cache. In-process
    /// cache when unset.
    pub redis_url: Option<String>,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Ledger engine tunables.
    pub engine: EngineConfig,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/plutus".into()),
            storage_backend: env_parse("STORAGE_BACKEND").unwrap_or(StorageBackend::Memory),
            redis_url: std::env::var("REDIS_URL").ok(),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS").unwrap_or(30),
            engine: EngineConfig {
                key_prefix: std::env::var("KEY_PREFIX").unwrap_or(defaults.key_prefix),
                idempotency_ttl_seconds: env_parse("IDEMPOTENCY_TTL_SECONDS")
                    .unwrap_or(defaults.idempotency_ttl_seconds),
                balance_cache_ttl_seconds: env_parse("BALANCE_CACHE_TTL_SECONDS")
                    .unwrap_or(defaults.balance_cache_ttl_seconds),
                freeze_ttl_seconds: env_parse("FREEZE_TTL_SECONDS")
                    .unwrap_or(defaults.freeze_ttl_seconds),
            },
        }
    }
}

/// Parse an environment variable, ignoring it when unset or malformed.
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/plutus".into(),
            storage_backend: StorageBackend::Memory,
            redis_url: None,
            service_api_key: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            engine: EngineConfig::default(),
        }
    }
}
