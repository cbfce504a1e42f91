//! Redis-backed cache mirror.
//!
//! Each product is one string key `<prefix><name>` holding the JSON encoded
//! [`StockSnapshot`]. Listing walks the prefix with `SCAN` so it never blocks
//! the server the way `KEYS` would.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::instrument;

use stockroom_core::ProductName;
use stockroom_inventory::StockSnapshot;

use super::{CacheError, CacheMirror, DEFAULT_KEY_PREFIX};

/// Keys fetched per `SCAN` round trip.
const SCAN_BATCH: usize = 100;

#[derive(Debug, Clone)]
pub struct RedisCacheMirror {
    client: Arc<redis::Client>,
    key_prefix: String,
}

impl RedisCacheMirror {
    /// Create a mirror for `redis_url`.
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `key_prefix` - product key prefix (default: "stockroom:product:")
    pub fn new(redis_url: impl AsRef<str>, key_prefix: Option<String>) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            key_prefix: key_prefix.unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
        })
    }

    fn key(&self, product: &ProductName) -> String {
        format!("{}{}", self.key_prefix, product)
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }

    /// Verify the server answers `PING`.
    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("PING", e))?;
        Ok(())
    }
}

fn command_error(command: &str, err: redis::RedisError) -> CacheError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        CacheError::Connection(format!("{} failed: {}", command, err))
    } else {
        CacheError::Command(format!("{} failed: {}", command, err))
    }
}

fn decode(key: &str, payload: &str) -> Result<StockSnapshot, CacheError> {
    serde_json::from_str(payload)
        .map_err(|e| CacheError::Deserialization(format!("entry '{}': {}", key, e)))
}

#[async_trait]
impl CacheMirror for RedisCacheMirror {
    #[instrument(skip(self), fields(product = %product), err)]
    async fn get(&self, product: &ProductName) -> Result<Option<StockSnapshot>, CacheError> {
        let key = self.key(product);
        let mut conn = self.connection().await?;

        let payload: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("GET", e))?;

        payload.map(|p| decode(&key, &p)).transpose()
    }

    #[instrument(skip(self, snapshot), fields(product = %snapshot.name, quantity = snapshot.quantity), err)]
    async fn put(&self, snapshot: &StockSnapshot) -> Result<(), CacheError> {
        let payload = serde_json::to_string(snapshot)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        let mut conn = self.connection().await?;

        let _: () = redis::cmd("SET")
            .arg(self.key(&snapshot.name))
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("SET", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(product = %product), err)]
    async fn remove(&self, product: &ProductName) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: u64 = redis::cmd("DEL")
            .arg(self.key(product))
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("DEL", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<StockSnapshot>, CacheError> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", self.key_prefix);

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| command_error("SCAN", e))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once.
        keys.sort();
        keys.dedup();

        let mut snapshots = Vec::with_capacity(keys.len());
        for key in keys {
            let payload: Option<String> = redis::cmd("GET")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .map_err(|e| command_error("GET", e))?;
            // Removed between SCAN and GET.
            if let Some(payload) = payload {
                snapshots.push(decode(&key, &payload)?);
            }
        }

        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(snapshots)
    }
}
