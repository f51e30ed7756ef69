//! Build remote providers and a ready scorer from [`ScoringConfig`].

use std::sync::Arc;

use imgscore_embeddings::{
    AzureOpenAIProvider, CachedEmbeddingProvider, ContentCache, EmbeddingProvider, OpenAIProvider,
};
use imgscore_vision::{
    AzureCaptionProvider, AzureMultimodalEmbedder, CachedCaptionProvider,
    CachedDescriptionProvider, CachedMultimodalEmbedder, CaptionProvider, ChatVisionProvider,
    DescriptionProvider, MultimodalEmbedder,
};
use tracing::info;

use crate::config::{OpenAIFlavor, ScoringConfig};
use crate::error::Result;
use crate::observer::ScoringObserver;
use crate::orchestrator::ImageScorer;

/// Every provider a scorer needs.
pub struct Providers {
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub captions: Arc<dyn CaptionProvider>,
    pub descriptions: Arc<dyn DescriptionProvider>,
    pub multimodal: Arc<dyn MultimodalEmbedder>,
}

pub fn build_embedding_provider(config: &ScoringConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let openai = &config.providers.openai;
    let timeout = config.limits.call_timeout();
    let primary_model = config
        .primary()
        .map(|m| m.model.clone())
        .unwrap_or_else(|| "text-embedding-ada-002".to_string());

    let provider: Arc<dyn EmbeddingProvider> = match openai.flavor {
        OpenAIFlavor::Azure => {
            let mut provider = AzureOpenAIProvider::new()
                .with_api_version(openai.embedding_api_version.as_str())
                .with_model(primary_model)
                .with_timeout(timeout)?;
            if let Some(endpoint) = &openai.endpoint {
                provider = provider.with_endpoint(endpoint.as_str());
            }
            if let Some(key) = &openai.api_key {
                provider = provider.with_api_key(key.as_str());
            }
            for model in &config.models {
                if let Some(deployment) = &model.deployment {
                    provider = provider.with_deployment(model.model.as_str(), deployment.as_str());
                }
            }
            Arc::new(provider)
        }
        OpenAIFlavor::OpenAI => {
            let mut provider = OpenAIProvider::new()
                .with_model(primary_model)
                .with_timeout(timeout)?;
            if let Some(base_url) = &openai.endpoint {
                provider = provider.with_base_url(base_url.as_str());
            }
            if let Some(key) = &openai.api_key {
                provider = provider.with_api_key(key.as_str());
            }
            Arc::new(provider)
        }
    };
    Ok(provider)
}

pub fn build_caption_provider(config: &ScoringConfig) -> Result<Arc<dyn CaptionProvider>> {
    let vision = &config.providers.vision;
    let mut provider = AzureCaptionProvider::new()
        .with_api_version(vision.caption_api_version.as_str())
        .with_timeout(config.limits.call_timeout())?;
    if let Some(endpoint) = &vision.endpoint {
        provider = provider.with_endpoint(endpoint.as_str());
    }
    if let Some(key) = &vision.api_key {
        provider = provider.with_api_key(key.as_str());
    }
    Ok(Arc::new(provider))
}

pub fn build_description_provider(config: &ScoringConfig) -> Result<Arc<dyn DescriptionProvider>> {
    let openai = &config.providers.openai;
    let provider = match openai.flavor {
        OpenAIFlavor::Azure => ChatVisionProvider::azure(
            openai.endpoint.clone(),
            openai.api_key.clone(),
            openai.chat_deployment.as_str(),
        )
        .with_api_version(openai.chat_api_version.as_str()),
        OpenAIFlavor::OpenAI => {
            let provider =
                ChatVisionProvider::openai(openai.api_key.clone(), openai.chat_deployment.as_str());
            match &openai.endpoint {
                Some(base_url) => provider.with_base_url(base_url.as_str()),
                None => provider,
            }
        }
    };
    Ok(Arc::new(provider.with_timeout(config.limits.call_timeout())?))
}

pub fn build_multimodal_embedder(config: &ScoringConfig) -> Result<Arc<dyn MultimodalEmbedder>> {
    let vision = &config.providers.vision;
    let mut embedder = AzureMultimodalEmbedder::new()
        .with_api_version(vision.retrieval_api_version.as_str())
        .with_model_version(vision.retrieval_model_version.as_str())
        .with_timeout(config.limits.call_timeout())?;
    if let Some(endpoint) = &vision.endpoint {
        embedder = embedder.with_endpoint(endpoint.as_str());
    }
    if let Some(key) = &vision.api_key {
        embedder = embedder.with_api_key(key.as_str());
    }
    Ok(Arc::new(embedder))
}

/// Remote providers for `config`, wrapped in caches when enabled.
pub fn build_providers(config: &ScoringConfig) -> Result<Providers> {
    let providers = Providers {
        embeddings: build_embedding_provider(config)?,
        captions: build_caption_provider(config)?,
        descriptions: build_description_provider(config)?,
        multimodal: build_multimodal_embedder(config)?,
    };
    Ok(with_caches(providers, config))
}

/// Wrap each provider in a content-addressed cache if `config.cache.enabled`.
pub fn with_caches(providers: Providers, config: &ScoringConfig) -> Providers {
    if !config.cache.enabled {
        return providers;
    }
    let max_entries = config.cache.max_entries;
    let ttl = config.cache.ttl();
    info!(max_entries, ttl_secs = config.cache.ttl_secs, "Caching provider results");

    Providers {
        embeddings: Arc::new(CachedEmbeddingProvider::new(
            providers.embeddings,
            ContentCache::new(max_entries, ttl),
        )),
        captions: Arc::new(CachedCaptionProvider::new(
            providers.captions,
            ContentCache::new(max_entries, ttl),
        )),
        descriptions: Arc::new(CachedDescriptionProvider::new(
            providers.descriptions,
            ContentCache::new(max_entries, ttl),
        )),
        multimodal: Arc::new(CachedMultimodalEmbedder::new(
            providers.multimodal,
            ContentCache::new(max_entries, ttl),
        )),
    }
}

/// Scorer over the remote providers described by `config`.
pub fn build_scorer(
    config: ScoringConfig,
    observer: Option<Arc<dyn ScoringObserver>>,
) -> Result<ImageScorer> {
    config.validate()?;
    let providers = build_providers(&config)?;
    scorer_from(providers, config, observer)
}

/// Scorer over explicit providers.
pub fn scorer_from(
    providers: Providers,
    config: ScoringConfig,
    observer: Option<Arc<dyn ScoringObserver>>,
) -> Result<ImageScorer> {
    let mut builder = ImageScorer::builder()
        .with_config(config)
        .with_embedding_provider(providers.embeddings)
        .with_caption_provider(providers.captions)
        .with_description_provider(providers.descriptions)
        .with_multimodal_embedder(providers.multimodal);
    if let Some(observer) = observer {
        builder = builder.with_observer(observer);
    }
    builder.build()
}
