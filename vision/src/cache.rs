//! Cached wrappers around the vision adapters.
//!
//! Keys hash the image bytes (or text) together with the provider name, so
//! repeated scoring of the same image skips the remote call.

use std::sync::Arc;

use async_trait::async_trait;
use imgscore_embeddings::{ContentCache, ContentKey, Embedding};
use tracing::debug;

use crate::error::Result;
use crate::traits::{CaptionProvider, DescriptionProvider, MultimodalEmbedder};
use crate::types::{CaptionResult, DescriptionResult};

pub struct CachedCaptionProvider {
    inner: Arc<dyn CaptionProvider>,
    cache: ContentCache<CaptionResult>,
}

impl CachedCaptionProvider {
    pub fn new(inner: Arc<dyn CaptionProvider>, cache: ContentCache<CaptionResult>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl CaptionProvider for CachedCaptionProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn caption(&self, image: &[u8]) -> Result<CaptionResult> {
        let key = ContentKey::bytes(image, self.inner.name());
        if let Some(hit) = self.cache.get(&key).await {
            debug!("Cache hit for caption");
            return Ok(hit);
        }
        let caption = self.inner.caption(image).await?;
        self.cache.put(key, self.inner.name(), caption.clone()).await;
        Ok(caption)
    }
}

pub struct CachedDescriptionProvider {
    inner: Arc<dyn DescriptionProvider>,
    cache: ContentCache<DescriptionResult>,
}

impl CachedDescriptionProvider {
    pub fn new(
        inner: Arc<dyn DescriptionProvider>,
        cache: ContentCache<DescriptionResult>,
    ) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl DescriptionProvider for CachedDescriptionProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn describe(&self, image: &[u8], mime_type: &str) -> Result<DescriptionResult> {
        let key = ContentKey::bytes(image, self.inner.name());
        if let Some(mut hit) = self.cache.get(&key).await {
            debug!("Cache hit for description");
            hit.token_usage = None;
            return Ok(hit);
        }
        let description = self.inner.describe(image, mime_type).await?;
        self.cache
            .put(key, self.inner.name(), description.clone())
            .await;
        Ok(description)
    }
}

/// Caches image vectors only; text vectors are cheap and prompt-specific.
pub struct CachedMultimodalEmbedder {
    inner: Arc<dyn MultimodalEmbedder>,
    cache: ContentCache<Embedding>,
}

impl CachedMultimodalEmbedder {
    pub fn new(inner: Arc<dyn MultimodalEmbedder>, cache: ContentCache<Embedding>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl MultimodalEmbedder for CachedMultimodalEmbedder {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model_name(&self) -> String {
        self.inner.model_name()
    }

    async fn embed_image(&self, image: &[u8]) -> Result<Embedding> {
        let model = self.inner.model_name();
        let key = ContentKey::bytes(image, &model);
        if let Some(hit) = self.cache.get(&key).await {
            debug!("Cache hit for image vector");
            return Ok(hit);
        }
        let vector = self.inner.embed_image(image).await?;
        self.cache.put(key, &model, vector.clone()).await;
        Ok(vector)
    }

    async fn embed_text(&self, text: &str) -> Result<Embedding> {
        self.inner.embed_text(text).await
    }
}
