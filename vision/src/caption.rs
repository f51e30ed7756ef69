//! Azure AI Vision image captioning.

use std::time::Duration;

use async_trait::async_trait;
use imgscore_embeddings::http::read_json;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, VisionError};
use crate::http::required;
use crate::traits::CaptionProvider;
use crate::types::CaptionResult;

/// Caption provider backed by the Image Analysis `analyze` endpoint.
pub struct AzureCaptionProvider {
    endpoint: Option<String>,
    api_key: Option<String>,
    api_version: String,
    client: reqwest::Client,
}

impl AzureCaptionProvider {
    /// Create a provider from `AZURE_VISION_ENDPOINT` / `AZURE_VISION_KEY`.
    pub fn new() -> Self {
        Self {
            endpoint: std::env::var("AZURE_VISION_ENDPOINT").ok(),
            api_key: std::env::var("AZURE_VISION_KEY").ok(),
            api_version: "2023-10-01".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }
}

impl Default for AzureCaptionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptionProvider for AzureCaptionProvider {
    fn name(&self) -> &str {
        "azure-vision-caption"
    }

    async fn caption(&self, image: &[u8]) -> Result<CaptionResult> {
        let endpoint = required(self.endpoint.as_ref(), "AZURE_VISION_ENDPOINT")?;
        let api_key = required(self.api_key.as_ref(), "AZURE_VISION_KEY")?;
        if image.is_empty() {
            return Err(VisionError::EmptyImage);
        }

        debug!("Requesting caption for {} byte image", image.len());

        let response = self
            .client
            .post(format!(
                "{}/computervision/imageanalysis:analyze",
                endpoint.trim_end_matches('/')
            ))
            .query(&[
                ("api-version", self.api_version.as_str()),
                ("features", "caption"),
                ("gender-neutral-caption", "true"),
                ("language", "en"),
            ])
            .header("Ocp-Apim-Subscription-Key", api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await?;

        let parsed: AnalyzeResponse = read_json::<_, VisionError>(response, "caption").await?;
        let caption = parsed
            .caption_result
            .filter(|c| !c.text.trim().is_empty())
            .ok_or(VisionError::NoCaptionGenerated)?;

        let model_used = match parsed.model_version {
            Some(version) => format!("azure-vision-{version}"),
            None => "azure-vision".to_string(),
        };

        Ok(CaptionResult {
            text: caption.text.trim().to_string(),
            confidence: caption.confidence.clamp(0.0, 1.0),
            model_used,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    caption_result: Option<AnalyzeCaption>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeCaption {
    #[serde(default)]
    text: String,
    #[serde(default)]
    confidence: f32,
}
