//! Health/capability descriptor served alongside the scoring endpoint.

use serde::Serialize;

use crate::config::EmbeddingModelConfig;

/// Metrics present in a successful scoring report.
pub const SUPPORTED_METRICS: [&str; 4] = [
    "primarySimilarity",
    "multimodalSimilarity",
    "descriptionSimilarity",
    "embeddingComparison",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub status: &'static str,
    pub version: &'static str,
    pub supported_metrics: Vec<&'static str>,
    pub supported_mime_types: Vec<String>,
    pub models: DescribedModels,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribedModels {
    pub caption: String,
    pub description: String,
    pub multimodal: String,
    /// Model behind the primary and description scores.
    pub primary_embedding: String,
    pub embedding_comparison: Vec<DescribedModel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribedModel {
    pub key: String,
    pub model: String,
    pub dimensions: usize,
}

impl ServiceDescriptor {
    pub fn new(
        caption: &str,
        description: &str,
        multimodal: String,
        primary: &EmbeddingModelConfig,
        models: &[EmbeddingModelConfig],
        supported_mime_types: &[String],
    ) -> Self {
        Self {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            supported_metrics: SUPPORTED_METRICS.to_vec(),
            supported_mime_types: supported_mime_types.to_vec(),
            models: DescribedModels {
                caption: caption.to_string(),
                description: description.to_string(),
                multimodal,
                primary_embedding: primary.model.clone(),
                embedding_comparison: models
                    .iter()
                    .map(|m| DescribedModel {
                        key: m.key.clone(),
                        model: m.model.clone(),
                        dimensions: m.dimensions,
                    })
                    .collect(),
            },
        }
    }
}
