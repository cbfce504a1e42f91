//! The cache mirror: per-product aggregate stock kept next to the ledger for
//! fast availability reads.
//!
//! The mirror is derived state. It is written only after the ledger commits,
//! so a failure here can leave it stale but never ahead of the ledger.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockroom_core::ProductName;
use stockroom_inventory::StockSnapshot;

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use in_memory::InMemoryCacheMirror;
#[cfg(feature = "redis")]
pub use self::redis::RedisCacheMirror;

/// Default key prefix for product entries.
pub const DEFAULT_KEY_PREFIX: &str = "stockroom:product:";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),

    #[error("cache command error: {0}")]
    Command(String),

    #[error("cache serialization error: {0}")]
    Serialization(String),

    #[error("cache deserialization error: {0}")]
    Deserialization(String),
}

#[async_trait]
pub trait CacheMirror: Send + Sync {
    /// Cached snapshot of `product`; `None` when no entry exists.
    async fn get(&self, product: &ProductName) -> Result<Option<StockSnapshot>, CacheError>;

    /// Store `snapshot`, replacing any entry for the same product.
    async fn put(&self, snapshot: &StockSnapshot) -> Result<(), CacheError>;

    async fn remove(&self, product: &ProductName) -> Result<(), CacheError>;

    /// Every cached snapshot, sorted by product name.
    async fn list(&self) -> Result<Vec<StockSnapshot>, CacheError>;
}

#[async_trait]
impl<C> CacheMirror for Arc<C>
where
    C: CacheMirror + ?Sized,
{
    async fn get(&self, product: &ProductName) -> Result<Option<StockSnapshot>, CacheError> {
        (**self).get(product).await
    }

    async fn put(&self, snapshot: &StockSnapshot) -> Result<(), CacheError> {
        (**self).put(snapshot).await
    }

    async fn remove(&self, product: &ProductName) -> Result<(), CacheError> {
        (**self).remove(product).await
    }

    async fn list(&self) -> Result<Vec<StockSnapshot>, CacheError> {
        (**self).list().await
    }
}
