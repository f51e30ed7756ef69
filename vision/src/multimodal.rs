//! Azure AI Vision multimodal embeddings (image retrieval API).
//!
//! `vectorizeImage` and `vectorizeText` share one model version, so the two
//! vectors are directly comparable with cosine similarity.

use std::time::Duration;

use async_trait::async_trait;
use imgscore_embeddings::Embedding;
use imgscore_embeddings::http::read_json;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, VisionError};
use crate::http::required;
use crate::traits::MultimodalEmbedder;

pub struct AzureMultimodalEmbedder {
    endpoint: Option<String>,
    api_key: Option<String>,
    api_version: String,
    model_version: String,
    client: reqwest::Client,
}

impl AzureMultimodalEmbedder {
    /// Create an embedder from `AZURE_VISION_ENDPOINT` / `AZURE_VISION_KEY`.
    pub fn new() -> Self {
        Self {
            endpoint: std::env::var("AZURE_VISION_ENDPOINT").ok(),
            api_key: std::env::var("AZURE_VISION_KEY").ok(),
            api_version: "2024-02-01".to_string(),
            model_version: "2023-04-15".to_string(),
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

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    fn request(&self, operation: &str) -> Result<reqwest::RequestBuilder> {
        let endpoint = required(self.endpoint.as_ref(), "AZURE_VISION_ENDPOINT")?;
        let api_key = required(self.api_key.as_ref(), "AZURE_VISION_KEY")?;
        Ok(self
            .client
            .post(format!(
                "{}/computervision/retrieval:{operation}",
                endpoint.trim_end_matches('/')
            ))
            .query(&[
                ("api-version", self.api_version.as_str()),
                ("model-version", self.model_version.as_str()),
            ])
            .header("Ocp-Apim-Subscription-Key", api_key))
    }
}

impl Default for AzureMultimodalEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MultimodalEmbedder for AzureMultimodalEmbedder {
    fn name(&self) -> &str {
        "azure-vision-retrieval"
    }

    fn model_name(&self) -> String {
        format!("azure-vision-multimodal-{}", self.model_version)
    }

    async fn embed_image(&self, image: &[u8]) -> Result<Embedding> {
        let request = self.request("vectorizeImage")?;
        if image.is_empty() {
            return Err(VisionError::EmptyImage);
        }

        debug!("Vectorizing {} byte image", image.len());
        let response = request
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await?;
        into_vector(read_json::<_, VisionError>(response, "vectorizeImage").await?)
    }

    async fn embed_text(&self, text: &str) -> Result<Embedding> {
        let request = self.request("vectorizeText")?;

        debug!("Vectorizing {} chars of text", text.len());
        let response = request
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;
        into_vector(read_json::<_, VisionError>(response, "vectorizeText").await?)
    }
}

fn into_vector(response: VectorizeResponse) -> Result<Embedding> {
    response
        .vector
        .filter(|v| !v.is_empty())
        .ok_or_else(|| VisionError::InvalidResponse("response has no vector".to_string()))
}

#[derive(Debug, Deserialize)]
struct VectorizeResponse {
    vector: Option<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(server: &MockServer) -> AzureMultimodalEmbedder {
        AzureMultimodalEmbedder::new()
            .with_endpoint(server.uri())
            .with_api_key("vision-key")
    }

    #[tokio::test]
    async fn vectorizes_image_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/computervision/retrieval:vectorizeImage"))
            .and(query_param("model-version", "2023-04-15"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "modelVersion": "2023-04-15",
                "vector": [0.5, 0.5, 0.0]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/computervision/retrieval:vectorizeText"))
            .and(body_json(serde_json::json!({ "text": "a mug" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "modelVersion": "2023-04-15",
                "vector": [0.5, 0.4, 0.1]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = embedder(&server);
        assert_eq!(embedder.embed_image(&[9, 9]).await.unwrap(), vec![0.5, 0.5, 0.0]);
        assert_eq!(embedder.embed_text("a mug").await.unwrap(), vec![0.5, 0.4, 0.1]);
        assert_eq!(embedder.model_name(), "azure-vision-multimodal-2023-04-15");
    }

    #[tokio::test]
    async fn missing_vector_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = embedder(&server).embed_text("x").await.unwrap_err();
        assert!(matches!(err, VisionError::InvalidResponse(_)));
    }
}
