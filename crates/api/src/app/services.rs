//! Store selection and service wiring.
//!
//! In-memory stores serve dev/test. Persistent mode (Postgres ledger + Redis
//! cache) needs the `redis` feature and `USE_PERSISTENT_STORES=true`.

use std::sync::Arc;

use thiserror::Error;

use stockroom_infra::StockService;
use stockroom_infra::cache::{CacheError, InMemoryCacheMirror};
use stockroom_infra::ledger::{InMemoryLotLedger, LedgerError};
#[cfg(feature = "redis")]
use stockroom_infra::{cache::RedisCacheMirror, ledger::PostgresLotLedger};

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("DATABASE_URL is required for persistent stores")]
    MissingDatabaseUrl,

    #[error("ledger setup failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("cache setup failed: {0}")]
    Cache(#[from] CacheError),
}

pub enum AppServices {
    InMemory {
        stock: Arc<StockService>,
    },
    #[cfg(feature = "redis")]
    Persistent {
        stock: Arc<StockService>,
        cache: Arc<RedisCacheMirror>,
    },
}

impl AppServices {
    pub fn stock(&self) -> &StockService {
        match self {
            AppServices::InMemory { stock } => stock,
            #[cfg(feature = "redis")]
            AppServices::Persistent { stock, .. } => stock,
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            AppServices::InMemory { .. } => "in_memory",
            #[cfg(feature = "redis")]
            AppServices::Persistent { .. } => "persistent",
        }
    }

    /// Probe the backing stores. In-memory stores are always ready.
    pub async fn ready(&self) -> bool {
        match self {
            AppServices::InMemory { .. } => true,
            #[cfg(feature = "redis")]
            AppServices::Persistent { cache, .. } => match cache.ping().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "cache not reachable");
                    false
                }
            },
        }
    }
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, BuildError> {
    if config.use_persistent_stores {
        #[cfg(feature = "redis")]
        {
            return build_persistent_services(config).await;
        }
        #[cfg(not(feature = "redis"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but redis feature not enabled, falling back to in-memory"
            );
            return Ok(build_in_memory_services(config));
        }
    }

    Ok(build_in_memory_services(config))
}

pub fn build_in_memory_services(config: &AppConfig) -> AppServices {
    let ledger = Arc::new(InMemoryLotLedger::new());
    let cache = Arc::new(InMemoryCacheMirror::new());
    let stock = Arc::new(StockService::new(ledger, cache, config.service_config()));
    AppServices::InMemory { stock }
}

#[cfg(feature = "redis")]
async fn build_persistent_services(config: &AppConfig) -> Result<AppServices, BuildError> {
    let database_url = config
        .database_url
        .as_deref()
        .ok_or(BuildError::MissingDatabaseUrl)?;

    let ledger = Arc::new(PostgresLotLedger::connect(database_url).await?);
    ledger.ensure_schema().await?;

    let cache = Arc::new(RedisCacheMirror::new(
        &config.redis_url,
        Some(config.cache_key_prefix.clone()),
    )?);
    cache.ping().await?;

    tracing::info!(redis_url = %config.redis_url, "persistent stores ready");

    let stock = Arc::new(StockService::new(
        ledger,
        cache.clone(),
        config.service_config(),
    ));
    Ok(AppServices::Persistent { stock, cache })
}
