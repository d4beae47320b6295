// SPDX-License-Identifier: Apache-2.0

//! Per-connection load-through access to the shared metadata cache

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::cursor::{MemoryCursor, RowCursor, TableData};
use crate::cache::MetadataCache;
use crate::config::{ConnectionConfig, MetadataCacheConfig};

/// A connection's view of a [`MetadataCache`] shared across connections.
///
/// Applies the connection's `metadataCacheEnabled` and `metadataCacheTtl`
/// overrides without touching the shared cache's own settings.
#[derive(Debug, Clone)]
pub struct CatalogCache {
    cache: Arc<MetadataCache>,
    settings: MetadataCacheConfig,
    ttl: Duration,
}

impl CatalogCache {
    pub fn new(config: &ConnectionConfig, cache: Arc<MetadataCache>) -> Self {
        let settings = config.metadata_cache_config(cache.config());
        let ttl = config.metadata_cache_ttl().unwrap_or_else(|| cache.ttl());
        Self {
            cache,
            settings,
            ttl,
        }
    }

    /// Whether this connection reads and writes the shared cache
    pub fn is_enabled(&self) -> bool {
        self.settings.enabled && self.cache.is_enabled()
    }

    pub fn lazy_load(&self) -> bool {
        self.settings.lazy_load
    }

    /// TTL applied to entries stored by this connection
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached result for `key`, or run `load` and store what it returns.
    ///
    /// Loader errors are returned as-is and nothing is cached.
    pub fn get_or_load<C, E, F>(&self, key: &str, load: F) -> Result<MemoryCursor, E>
    where
        C: RowCursor,
        F: FnOnce() -> Result<C, E>,
    {
        if let Some(cursor) = self.probe(key) {
            return Ok(cursor);
        }
        let mut loaded = load()?;
        Ok(self.store(key, &mut loaded))
    }

    /// Async variant of [`CatalogCache::get_or_load`]
    pub async fn get_or_load_async<C, E, F, Fut>(
        &self,
        key: &str,
        load: F,
    ) -> Result<MemoryCursor, E>
    where
        C: RowCursor,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, E>>,
    {
        if let Some(cursor) = self.probe(key) {
            return Ok(cursor);
        }
        let mut loaded = load().await?;
        Ok(self.store(key, &mut loaded))
    }

    /// Drop every cached table and column listing beneath `dataset`
    pub fn invalidate_dataset(&self, dataset: &str) -> usize {
        self.cache.invalidate_dataset(dataset)
    }

    fn probe(&self, key: &str) -> Option<MemoryCursor> {
        if !self.is_enabled() {
            return None;
        }
        self.cache.get(key)
    }

    /// Materialize `loaded`, cache it if enabled, and hand back a cursor of our own
    fn store(&self, key: &str, loaded: &mut dyn RowCursor) -> MemoryCursor {
        let data = Arc::new(TableData::drain(loaded));
        if self.is_enabled() {
            self.cache.insert(key.to_string(), Arc::clone(&data), self.ttl);
        } else {
            debug!("Metadata cache disabled for connection, not caching {}", key);
        }
        MemoryCursor::from_shared(data)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::thread;

    use super::*;
    use crate::cache::cursor::{types, Value};
    use crate::cache::key;
    use crate::properties::PropertyBag;

    fn connection(url: &str) -> ConnectionConfig {
        ConnectionConfig::from_url(url, &PropertyBag::new()).unwrap()
    }

    fn schemas(names: &[&str]) -> MemoryCursor {
        MemoryCursor::new(
            vec!["TABLE_SCHEM".to_string()],
            vec![types::VARCHAR],
            names.iter().map(|name| vec![Value::from(*name)]).collect(),
        )
    }

    #[test]
    fn test_loads_once_then_hits() {
        let shared = Arc::new(MetadataCache::default());
        let catalog = CatalogCache::new(&connection("jdbc:bigquery:proj"), Arc::clone(&shared));
        let loads = Cell::new(0);
        let cache_key = key::schemas("proj", "%");

        for _ in 0..3 {
            let mut cursor = catalog
                .get_or_load(&cache_key, || {
                    loads.set(loads.get() + 1);
                    Ok::<_, String>(schemas(&["sales", "hr"]))
                })
                .unwrap();
            assert_eq!(cursor.collect_rows().len(), 2);
        }

        assert_eq!(loads.get(), 1);
        assert_eq!(shared.size(), 1);
        assert_eq!(shared.stats().hits, 2);
    }

    #[test]
    fn test_loader_error_is_not_cached() {
        let shared = Arc::new(MetadataCache::default());
        let catalog = CatalogCache::new(&connection("jdbc:bigquery:proj"), Arc::clone(&shared));

        let result = catalog.get_or_load("schemas:proj:%", || Err::<MemoryCursor, _>("boom"));
        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(shared.size(), 0);
    }

    #[test]
    fn test_connection_can_disable_cache() {
        let shared = Arc::new(MetadataCache::default());
        let catalog = CatalogCache::new(
            &connection("jdbc:bigquery:proj?metadataCacheEnabled=false"),
            Arc::clone(&shared),
        );
        assert!(!catalog.is_enabled());

        let loads = Cell::new(0);
        for _ in 0..2 {
            let mut cursor = catalog
                .get_or_load("schemas:proj:%", || {
                    loads.set(loads.get() + 1);
                    Ok::<_, String>(schemas(&["sales"]))
                })
                .unwrap();
            assert_eq!(cursor.collect_rows(), vec![vec![Value::from("sales")]]);
        }

        assert_eq!(loads.get(), 2);
        assert_eq!(shared.size(), 0);
    }

    #[test]
    fn test_connection_ttl_override() {
        let shared = Arc::new(MetadataCache::with_ttl(Duration::from_secs(300)));
        let catalog = CatalogCache::new(
            &connection("jdbc:bigquery:proj?metadataCacheTtl=0&metadataLazyLoad=true"),
            Arc::clone(&shared),
        );
        assert_eq!(catalog.ttl(), Duration::ZERO);
        assert!(catalog.lazy_load());

        catalog
            .get_or_load("schemas:proj:%", || Ok::<_, String>(schemas(&["sales"])))
            .unwrap();
        thread::sleep(Duration::from_millis(5));
        assert!(shared.get("schemas:proj:%").is_none());
    }

    #[test]
    fn test_inherits_shared_ttl() {
        let shared = Arc::new(MetadataCache::with_ttl(Duration::from_secs(42)));
        let catalog = CatalogCache::new(&connection("jdbc:bigquery:proj"), shared);
        assert_eq!(catalog.ttl(), Duration::from_secs(42));
        assert!(!catalog.lazy_load());
    }

    #[tokio::test]
    async fn test_async_load_through() {
        let shared = Arc::new(MetadataCache::default());
        let catalog = CatalogCache::new(&connection("jdbc:bigquery:proj/sales"), Arc::clone(&shared));
        let cache_key = key::tables("sales", "%");

        let mut first = catalog
            .get_or_load_async(&cache_key, || async {
                tokio::task::yield_now().await;
                Ok::<_, String>(schemas(&["orders", "users"]))
            })
            .await
            .unwrap();
        assert_eq!(first.collect_rows().len(), 2);

        let second = catalog
            .get_or_load_async(&cache_key, || async {
                Err::<MemoryCursor, _>("should not load".to_string())
            })
            .await
            .unwrap();
        assert_eq!(second.remaining(), 2);

        assert_eq!(catalog.invalidate_dataset("sales"), 1);
        assert_eq!(shared.size(), 0);
    }
}
