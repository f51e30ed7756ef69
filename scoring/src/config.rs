//! Configuration for the image scorer.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoringError};

/// Configuration for the image scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Remote service endpoints and credentials.
    pub providers: ProvidersConfig,

    /// Embedding models compared for every request.
    pub models: Vec<EmbeddingModelConfig>,

    /// Key of the model used for the primary and description scores.
    pub primary_model: String,

    /// Outbound call limits.
    pub limits: CallLimits,

    /// Result caching across requests.
    pub cache: CacheConfig,

    /// Accepted upload content types.
    pub allowed_mime_types: Vec<String>,
}

impl ScoringConfig {
    /// Overlay endpoints and secrets from the environment.
    ///
    /// Values already present in the config file win over the environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    pub(crate) fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());
        let openai = &mut self.providers.openai;
        match openai.flavor {
            OpenAIFlavor::Azure => {
                fill(&mut openai.endpoint, var("AZURE_OPENAI_ENDPOINT"));
                fill(&mut openai.api_key, var("AZURE_OPENAI_API_KEY"));
            }
            OpenAIFlavor::OpenAI => {
                fill(&mut openai.api_key, var("OPENAI_API_KEY"));
            }
        }
        if let Some(deployment) = var("AZURE_OPENAI_CHAT_DEPLOYMENT") {
            openai.chat_deployment = deployment;
        }

        let vision = &mut self.providers.vision;
        fill(&mut vision.endpoint, var("AZURE_VISION_ENDPOINT"));
        fill(&mut vision.api_key, var("AZURE_VISION_KEY"));
    }

    /// Check the model table and limits.
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(ScoringError::Config(
                "at least one embedding model must be configured".to_string(),
            ));
        }

        let mut keys = HashSet::new();
        for model in &self.models {
            if model.key.trim().is_empty() || model.model.trim().is_empty() {
                return Err(ScoringError::Config(
                    "embedding models need a key and a model name".to_string(),
                ));
            }
            if model.dimensions == 0 {
                return Err(ScoringError::Config(format!(
                    "model `{}` has zero dimensions",
                    model.key
                )));
            }
            if !keys.insert(model.key.as_str()) {
                return Err(ScoringError::Config(format!(
                    "duplicate model key `{}`",
                    model.key
                )));
            }
        }

        if self.primary().is_none() {
            return Err(ScoringError::Config(format!(
                "primary model `{}` is not in the model list",
                self.primary_model
            )));
        }
        if self.limits.request_deadline_ms == 0 {
            return Err(ScoringError::Config(
                "request_deadline_ms must be positive".to_string(),
            ));
        }
        if self.limits.max_concurrent_calls == 0 {
            return Err(ScoringError::Config(
                "max_concurrent_calls must be at least 1".to_string(),
            ));
        }
        if self.allowed_mime_types.is_empty() {
            return Err(ScoringError::Config(
                "allowed_mime_types must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The model used for the primary and description scores.
    pub fn primary(&self) -> Option<&EmbeddingModelConfig> {
        self.models.iter().find(|m| m.key == self.primary_model)
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            providers: ProvidersConfig::default(),
            models: vec![
                EmbeddingModelConfig::new("ada002", "text-embedding-ada-002", 1536),
                EmbeddingModelConfig::new("embedding3Small", "text-embedding-3-small", 1536),
                EmbeddingModelConfig::new("embedding3Large", "text-embedding-3-large", 3072),
            ],
            primary_model: "ada002".to_string(),
            limits: CallLimits::default(),
            cache: CacheConfig::default(),
            allowed_mime_types: [
                "image/jpeg",
                "image/png",
                "image/webp",
                "image/gif",
                "image/bmp",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.as_deref().is_none_or(|s| s.trim().is_empty()) {
        *slot = value;
    }
}

/// Remote services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: OpenAIConfig,
    pub vision: VisionConfig,
}

/// Which OpenAI-compatible API serves embeddings and chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenAIFlavor {
    /// Azure OpenAI deployments.
    Azure,
    /// Public OpenAI API.
    #[serde(rename = "openai")]
    OpenAI,
}

/// Embeddings and vision-chat service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIConfig {
    pub flavor: OpenAIFlavor,

    /// Azure resource endpoint, or a base URL override for the public API.
    pub endpoint: Option<String>,

    pub api_key: Option<String>,

    pub embedding_api_version: String,

    pub chat_api_version: String,

    /// Azure deployment (or OpenAI model) used for image descriptions.
    pub chat_deployment: String,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            flavor: OpenAIFlavor::Azure,
            endpoint: None,
            api_key: None,
            embedding_api_version: "2023-05-15".to_string(),
            chat_api_version: "2024-02-15-preview".to_string(),
            chat_deployment: "gpt-4o".to_string(),
        }
    }
}

/// Azure AI Vision (captions and multimodal vectors).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub caption_api_version: String,
    pub retrieval_api_version: String,
    pub retrieval_model_version: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            caption_api_version: "2023-10-01".to_string(),
            retrieval_api_version: "2024-02-01".to_string(),
            retrieval_model_version: "2023-04-15".to_string(),
        }
    }
}

/// One embedding model in the comparison table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingModelConfig {
    /// Key under which the model's result is reported.
    pub key: String,

    /// Provider model name.
    pub model: String,

    /// Azure deployment name; defaults to the model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,

    pub dimensions: usize,
}

impl EmbeddingModelConfig {
    pub fn new(key: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            key: key.into(),
            model: model.into(),
            deployment: None,
            dimensions,
        }
    }

    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = Some(deployment.into());
        self
    }
}

/// Limits applied to every outbound call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallLimits {
    /// Per-call timeout.
    pub call_timeout_ms: u64,

    /// Outbound calls in flight at once, across all requests.
    pub max_concurrent_calls: usize,

    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,

    /// First retry delay; doubles per attempt.
    pub retry_backoff_ms: u64,

    /// Upper bound for any single retry delay, including `Retry-After`.
    pub max_backoff_ms: u64,

    /// Budget for a whole request. Calls still running when it expires are
    /// abandoned and their branches degrade as if the call had failed.
    pub request_deadline_ms: u64,
}

impl CallLimits {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}

impl Default for CallLimits {
    fn default() -> Self {
        Self {
            call_timeout_ms: 20_000,
            max_concurrent_calls: 8,
            max_retries: 2,
            retry_backoff_ms: 250,
            max_backoff_ms: 5_000,
            request_deadline_ms: 90_000,
        }
    }
}

/// Cross-request result cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600, // 1 hour
            max_entries: 10000,
        }
    }
}
