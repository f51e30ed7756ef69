//! Content-addressed cache for provider results.
//!
//! Keys are SHA-256 digests over the content (text or image bytes) and the
//! model that produced the value, so identical inputs under the same model
//! share an entry across requests. Entries expire after a TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};

/// Digest identifying one cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey(String);

impl ContentKey {
    /// Key for a text input under a model.
    pub fn text(text: &str, model: &str) -> Self {
        Self::bytes(text.as_bytes(), model)
    }

    /// Key for raw content (e.g. image bytes) under a model.
    pub fn bytes(content: &[u8], model: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        // Separator so ("ab", "c") and ("a", "bc") never collide.
        hasher.update([0u8]);
        hasher.update(content);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct CacheEntry<V> {
    value: V,
    model: String,
    created_at: Instant,
}

/// TTL-bounded in-memory cache shared by concurrent requests.
pub struct ContentCache<V> {
    entries: Arc<RwLock<HashMap<ContentKey, CacheEntry<V>>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<V: Clone + Send + Sync> ContentCache<V> {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_entries,
        }
    }

    /// Get a live value from the cache.
    pub async fn get(&self, key: &ContentKey) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.created_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Put a value in the cache.
    pub async fn put(&self, key: ContentKey, model: &str, value: V) {
        if self.max_entries == 0 {
            return;
        }

        let mut entries = self.entries.write().await;

        // Expired entries go first, then the oldest one if still at capacity.
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.created_at.elapsed() < ttl);
        if entries.len() >= self.max_entries {
            let oldest_key = entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest_key) = oldest_key {
                entries.remove(&oldest_key);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                model: model.to_string(),
                created_at: Instant::now(),
            },
        );
        debug!("Cached value (model: {model})");
    }

    /// Check if a live value is cached.
    pub async fn contains(&self, key: &ContentKey) -> bool {
        self.get(key).await.is_some()
    }

    /// Remove a value from the cache.
    pub async fn invalidate(&self, key: &ContentKey) {
        self.entries.write().await.remove(key);
    }

    /// Clear the entire cache.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        info!("Cleared content cache");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let mut models: Vec<String> = entries.values().map(|e| e.model.clone()).collect();
        models.sort();
        models.dedup();
        CacheStats {
            entries: entries.len(),
            max_entries: self.max_entries,
            models,
        }
    }
}

/// Statistics about a content cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub max_entries: usize,

    /// Models with cached values.
    pub models: Vec<String>,
}

/// An embedding provider that consults the cache before calling out.
pub struct CachedEmbeddingProvider {
    provider: Arc<dyn EmbeddingProvider>,
    cache: ContentCache<EmbeddingResponse>,
}

impl CachedEmbeddingProvider {
    /// Create a new cached provider.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: ContentCache<EmbeddingResponse>) -> Self {
        Self { provider, cache }
    }

    /// Get the underlying cache.
    pub fn cache(&self) -> &ContentCache<EmbeddingResponse> {
        &self.cache
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn default_model(&self) -> &str {
        self.provider.default_model()
    }

    fn default_dimension(&self) -> usize {
        self.provider.default_dimension()
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string());
        let key = ContentKey::text(&request.text, &model);

        if let Some(mut hit) = self.cache.get(&key).await {
            debug!("Cache hit for embedding (model: {model})");
            // Served from memory, nothing was billed.
            hit.tokens_used = Some(0);
            return Ok(hit);
        }

        let response = self.provider.embed(request).await?;
        self.cache.put(key, &model, response.clone()).await;
        Ok(response)
    }

    fn is_available(&self) -> bool {
        self.provider.is_available()
    }
}
