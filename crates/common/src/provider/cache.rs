//! In-memory search cache wrapping any provider

use super::MetadataProvider;
use crate::errors::Result;
use crate::metrics;
use crate::models::Reference;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

type CacheKey = (String, usize);

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, Vec<Reference>>,
    order: VecDeque<CacheKey>,
}

/// Caches `search` results by `(query, limit)`, evicting the oldest entry at
/// capacity. Batch lookups pass through.
pub struct CachedProvider {
    inner: Arc<dyn MetadataProvider>,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn MetadataProvider>, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// The wrapped provider, for requests that bypass the cache
    pub fn inner(&self) -> Arc<dyn MetadataProvider> {
        self.inner.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MetadataProvider for CachedProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Reference>> {
        if self.capacity == 0 {
            return self.inner.search(query, limit).await;
        }

        let key = (query.trim().to_lowercase(), limit);
        if let Some(hit) = self.state.lock().await.entries.get(&key) {
            metrics::record_cache(true, "search");
            debug!(query, limit, "Search cache hit");
            return Ok(hit.clone());
        }
        metrics::record_cache(false, "search");

        // Errors are not cached
        let results = self.inner.search(query, limit).await?;

        let mut state = self.state.lock().await;
        if !state.entries.contains_key(&key) {
            while state.entries.len() >= self.capacity {
                match state.order.pop_front() {
                    Some(oldest) => {
                        state.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            state.order.push_back(key.clone());
            state.entries.insert(key, results.clone());
        }

        Ok(results)
    }

    async fn batch_lookup(&self, dois: &[String]) -> Result<HashMap<String, Reference>> {
        self.inner.batch_lookup(dois).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
