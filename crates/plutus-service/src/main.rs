//! Plutus Service - HTTP API for the credit ledger
//!
//! This is the main entry point for the plutus service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plutus_engine::{CreditEngine, CreditOperations};
use plutus_service::{create_router, AppState, ServiceConfig, StorageBackend};
use plutus_store::{KvStore, MemoryKv, MemoryStore};

type BoxError = Box<dyn std::error::Error>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,plutus=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Plutus Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        storage_backend = ?config.storage_backend,
        redis_configured = %config.redis_url.is_some(),
        key_prefix = %config.engine.key_prefix,
        "Service configuration loaded"
    );

    let kv = open_kv(&config)?;
    let engine = open_engine(&config, kv)?;

    let state = AppState::new(engine, config.clone());
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Open the cache/lock store: Redis when configured, in-process otherwise.
fn open_kv(config: &ServiceConfig) -> Result<Arc<dyn KvStore>, BoxError> {
    match &config.redis_url {
        #[cfg(feature = "redis-backend")]
        Some(url) => {
            tracing::info!("Using Redis for idempotency keys and balance cache");
            Ok(Arc::new(plutus_store::RedisKv::open(url)?))
        }
        #[cfg(not(feature = "redis-backend"))]
        Some(_) => Err("REDIS_URL is set but the redis-backend feature is disabled".into()),
        None => {
            tracing::warn!("REDIS_URL not set - idempotency keys are per-process");
            Ok(Arc::new(MemoryKv::new()))
        }
    }
}

/// Open the ledger store and build the engine on it.
fn open_engine(
    config: &ServiceConfig,
    kv: Arc<dyn KvStore>,
) -> Result<Arc<dyn CreditOperations>, BoxError> {
    match config.storage_backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory ledger store - state is lost on restart");
            let store = Arc::new(MemoryStore::new());
            Ok(Arc::new(CreditEngine::new(store, kv, config.engine.clone())))
        }
        #[cfg(feature = "rocksdb-backend")]
        StorageBackend::Rocks => {
            tracing::info!(path = %config.data_dir, "Opening RocksDB store");
            let store = Arc::new(plutus_store::RocksStore::open(&config.data_dir)?);
            Ok(Arc::new(CreditEngine::new(store, kv, config.engine.clone())))
        }
        #[cfg(not(feature = "rocksdb-backend"))]
        StorageBackend::Rocks => {
            Err("STORAGE_BACKEND=rocks requires the rocksdb-backend feature".into())
        }
    }
}
