//! Application state shared across handlers

use std::sync::Arc;
use tech_insights_engine::FactChecker;
use tech_insights_storage::{FactStore, InMemoryCatalog, InMemoryFactStore};

use crate::{ConfigError, TechInsightsConfig};

const DEFAULT_CONCURRENCY: usize = 10;

/// Shared application state
pub struct AppState {
    pub fact_checker: Arc<FactChecker>,
    pub fact_store: Arc<dyn FactStore>,
    /// Entities evaluated at once by `POST /checks/run`
    pub concurrency: usize,
}

impl AppState {
    pub fn new(fact_checker: Arc<FactChecker>, fact_store: Arc<dyn FactStore>) -> Self {
        Self {
            fact_checker,
            fact_store,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Create the in-memory stores, apply the seed file and build the fact checker.
    ///
    /// Fails fast when a configured check does not match the condition grammar.
    pub async fn from_config(config: &TechInsightsConfig) -> Result<Self, ConfigError> {
        let fact_store = Arc::new(InMemoryFactStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());

        if let Some(seed) = config.load_seed()? {
            seed.apply(fact_store.as_ref(), &catalog).await?;
        }

        let checks = config.load_checks()?;
        let check_count = checks.len();
        let fact_checker = FactChecker::builder()
            .fact_store(fact_store.clone())
            .catalog(catalog)
            .check_documents(checks)
            .build()?;

        tracing::info!("Loaded {} checks", check_count);

        Ok(Self::new(Arc::new(fact_checker), fact_store).with_concurrency(config.checks.concurrency))
    }
}
