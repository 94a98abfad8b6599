//! Time-bounded cache of fund records

use cached::{Cached, TimedCache};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Thread-safe cache of records keyed by exchange symbol
#[derive(Clone)]
pub struct QuoteCache {
    cache: Arc<RwLock<TimedCache<String, Value>>>,
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    pub async fn get(&self, symbol: &str) -> Option<Value> {
        let mut cache = self.cache.write().await;
        cache.cache_get(symbol).cloned()
    }

    pub async fn insert(&self, symbol: impl Into<String>, value: Value) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(symbol.into(), value);
    }

    pub async fn clear(&self) {
        self.cache.write().await.cache_clear();
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
