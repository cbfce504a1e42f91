use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use stockroom_core::ProductName;
use stockroom_inventory::StockSnapshot;

use super::{CacheError, CacheMirror};

/// In-memory cache mirror.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCacheMirror {
    entries: RwLock<BTreeMap<ProductName, StockSnapshot>>,
}

impl InMemoryCacheMirror {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> CacheError {
        CacheError::Connection("lock poisoned".to_string())
    }
}

#[async_trait]
impl CacheMirror for InMemoryCacheMirror {
    async fn get(&self, product: &ProductName) -> Result<Option<StockSnapshot>, CacheError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.get(product).cloned())
    }

    async fn put(&self, snapshot: &StockSnapshot) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.insert(snapshot.name.clone(), snapshot.clone());
        Ok(())
    }

    async fn remove(&self, product: &ProductName) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.remove(product);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StockSnapshot>, CacheError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_replaces_and_remove_deletes() {
        let cache = InMemoryCacheMirror::new();
        let apple = ProductName::parse("apple").unwrap();

        cache.put(&StockSnapshot::new(apple.clone(), 3, None)).await.unwrap();
        cache.put(&StockSnapshot::new(apple.clone(), 7, None)).await.unwrap();
        assert_eq!(cache.get(&apple).await.unwrap().unwrap().quantity, 7);

        cache.remove(&apple).await.unwrap();
        assert_eq!(cache.get(&apple).await.unwrap(), None);
        cache.remove(&apple).await.unwrap();
    }

    #[tokio::test]
    async fn list_is_sorted_by_name() {
        let cache = InMemoryCacheMirror::new();
        for n in ["pear", "apple", "kiwi"] {
            let name = ProductName::parse(n).unwrap();
            cache.put(&StockSnapshot::new(name, 1, None)).await.unwrap();
        }
        let names: Vec<String> = cache
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name.into_inner())
            .collect();
        assert_eq!(names, vec!["apple", "kiwi", "pear"]);
    }
}
