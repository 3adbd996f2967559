//! Application state.

use std::sync::Arc;

use plutus_engine::CreditOperations;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The ledger engine, behind whichever backends were opened.
    pub engine: Arc<dyn CreditOperations>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(engine: Arc<dyn CreditOperations>, config: ServiceConfig) -> Self {
        if config.service_api_key.is_none() {
            tracing::warn!("SERVICE_API_KEY not set - all ledger requests will be rejected");
        }
        Self { engine, config }
    }
}
