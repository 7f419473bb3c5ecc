//! Process-wide cache of article embeddings.
//!
//! Keyed by `(article id, provider identifier)` so switching providers never
//! mixes vector spaces. Bounded LRU; a capacity of `0` disables caching
//! entirely and every lookup misses.
//!
//! Concurrent misses for the same key may both call the provider. The last
//! `put` wins; provider output is deterministic so either value is correct.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;

type Key = (String, String);

/// Bounded LRU of embedding vectors, shared behind a mutex.
pub struct EmbeddingCache {
    inner: Option<Mutex<LruCache<Key, Arc<Vec<f32>>>>>,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    /// A cache that stores nothing.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// The entries only hold derived vectors, so a poisoned lock is still usable.
    fn lock(&self) -> Option<MutexGuard<'_, LruCache<Key, Arc<Vec<f32>>>>> {
        self.inner
            .as_ref()
            .map(|inner| inner.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn get(&self, article_id: &str, provider: &str) -> Option<Arc<Vec<f32>>> {
        let mut cache = self.lock()?;
        cache
            .get(&(article_id.to_string(), provider.to_string()))
            .cloned()
    }

    pub fn put(&self, article_id: &str, provider: &str, vector: Arc<Vec<f32>>) {
        if let Some(mut cache) = self.lock() {
            cache.put((article_id.to_string(), provider.to_string()), vector);
        }
    }

    /// Drop every entry for an article, whatever the provider.
    pub fn invalidate_article(&self, article_id: &str) {
        if let Some(mut cache) = self.lock() {
            let stale: Vec<Key> = cache
                .iter()
                .filter(|((id, _), _)| id == article_id)
                .map(|(key, _)| key.clone())
                .collect();
            for key in stale {
                cache.pop(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(1024)
    }
}
