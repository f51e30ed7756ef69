//! Vision-capable chat completions used as an image describer.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use imgscore_embeddings::http::read_json;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, VisionError};
use crate::http::required;
use crate::traits::DescriptionProvider;
use crate::types::{DescriptionResult, TokenUsage};

/// Instruction sent with every image.
pub const DESCRIPTION_SYSTEM_PROMPT: &str = "You are an objective product image analyst. \
Describe the image in about 25 words. Cover material, color, finish, surface, background, \
lighting, composition and style. State only what is visible; no opinions, no speculation.";

const USER_PROMPT: &str = "Describe this image.";

/// Where chat completions are served from.
#[derive(Debug, Clone)]
enum ChatTarget {
    /// Azure OpenAI: model addressed by deployment name.
    Azure {
        endpoint: Option<String>,
        deployment: String,
        api_version: String,
    },
    /// Public OpenAI API: model named in the body.
    OpenAI { base_url: String, model: String },
}

/// Description provider backed by a vision-capable chat model.
pub struct ChatVisionProvider {
    target: ChatTarget,
    api_key: Option<String>,
    temperature: f64,
    max_tokens: u32,
    client: reqwest::Client,
}

impl ChatVisionProvider {
    /// Azure OpenAI deployment, e.g. a `gpt-4o` deployment.
    pub fn azure(
        endpoint: Option<String>,
        api_key: Option<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            target: ChatTarget::Azure {
                endpoint,
                deployment: deployment.into(),
                api_version: "2024-02-15-preview".to_string(),
            },
            api_key,
            temperature: 0.1,
            max_tokens: 100,
            client: reqwest::Client::new(),
        }
    }

    /// Public OpenAI chat completions.
    pub fn openai(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            target: ChatTarget::OpenAI {
                base_url: "https://api.openai.com/v1".to_string(),
                model: model.into(),
            },
            api_key,
            temperature: 0.1,
            max_tokens: 100,
            client: reqwest::Client::new(),
        }
    }

    /// Override the Azure `api-version`; no effect on OpenAI targets.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        if let ChatTarget::Azure { api_version, .. } = &mut self.target {
            *api_version = version.into();
        }
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        if let ChatTarget::OpenAI { base_url, .. } = &mut self.target {
            *base_url = url.into();
        }
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    fn model_label(&self) -> &str {
        match &self.target {
            ChatTarget::Azure { deployment, .. } => deployment,
            ChatTarget::OpenAI { model, .. } => model,
        }
    }

    fn payload(&self, image: &[u8], mime_type: &str) -> serde_json::Value {
        let data_url = format!("data:{mime_type};base64,{}", STANDARD.encode(image));
        let mut body = serde_json::json!({
            "messages": [
                { "role": "system", "content": DESCRIPTION_SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": USER_PROMPT },
                        { "type": "image_url", "image_url": { "url": data_url } }
                    ]
                }
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens
        });
        if let ChatTarget::OpenAI { model, .. } = &self.target {
            body["model"] = serde_json::json!(model);
        }
        body
    }
}

#[async_trait]
impl DescriptionProvider for ChatVisionProvider {
    fn name(&self) -> &str {
        match self.target {
            ChatTarget::Azure { .. } => "azure-openai-chat",
            ChatTarget::OpenAI { .. } => "openai-chat",
        }
    }

    async fn describe(&self, image: &[u8], mime_type: &str) -> Result<DescriptionResult> {
        let api_key = required(self.api_key.as_ref(), "chat api key")?;
        if image.is_empty() {
            return Err(VisionError::EmptyImage);
        }

        let body = self.payload(image, mime_type);
        let request = match &self.target {
            ChatTarget::Azure {
                endpoint,
                deployment,
                api_version,
            } => {
                let endpoint = required(endpoint.as_ref(), "AZURE_OPENAI_ENDPOINT")?;
                self.client
                    .post(format!(
                        "{}/openai/deployments/{deployment}/chat/completions",
                        endpoint.trim_end_matches('/')
                    ))
                    .query(&[("api-version", api_version.as_str())])
                    .header("api-key", api_key)
            }
            ChatTarget::OpenAI { base_url, .. } => self
                .client
                .post(format!(
                    "{}/chat/completions",
                    base_url.trim_end_matches('/')
                ))
                .bearer_auth(api_key),
        };

        debug!("Requesting description from {}", self.model_label());

        let response = request.json(&body).send().await?;
        let parsed: ChatCompletion = read_json::<_, VisionError>(response, "chat completion").await?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                VisionError::InvalidResponse("chat completion has no content".to_string())
            })?;

        Ok(DescriptionResult {
            text,
            model_used: parsed.model.unwrap_or_else(|| self.model_label().to_string()),
            token_usage: parsed
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    model: Option<String>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
