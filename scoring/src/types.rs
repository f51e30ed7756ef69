//! Scoring request and response types.
//!
//! Optional scores are `Option`s: a branch that failed leaves its field
//! absent from the serialized response instead of reporting a zero.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use imgscore_embeddings::SimilarityGrade;
use imgscore_vision::TokenUsage;
use serde::{Serialize, Serializer};

/// An uploaded image and the prompt it should be judged against.
#[derive(Debug, Clone)]
pub struct ScoringRequest {
    pub image: Vec<u8>,
    /// Content type declared by the uploader, if any.
    pub mime_type: Option<String>,
    pub prompt: String,
}

impl ScoringRequest {
    pub fn new(image: impl Into<Vec<u8>>, prompt: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            mime_type: None,
            prompt: prompt.into(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Outcome of one scoring request. Serializes with a `success` flag.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringResponse {
    Success(Box<ScoringReport>),
    Failure(ScoringFailure),
}

impl ScoringResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn report(&self) -> Option<&ScoringReport> {
        match self {
            Self::Success(report) => Some(report),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ScoringFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

#[derive(Serialize)]
struct Flagged<'a, T> {
    success: bool,
    #[serde(flatten)]
    body: &'a T,
}

impl Serialize for ScoringResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success(report) => Flagged {
                success: true,
                body: report.as_ref(),
            }
            .serialize(serializer),
            Self::Failure(failure) => Flagged {
                success: false,
                body: failure,
            }
            .serialize(serializer),
        }
    }
}

/// Every score computed for a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringReport {
    pub scores: Scores,
    pub grades: Grades,
    /// Per-model comparison keyed by configured model key.
    pub embedding_comparison: BTreeMap<String, EmbeddingModelResult>,
    pub metadata: ReportMetadata,
    pub caption_details: CaptionDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_details: Option<DescriptionDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multimodal_details: Option<MultimodalDetails>,
}

/// Rounded similarities in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    /// Prompt vs caption; falls back to token overlap, so always present.
    pub primary_similarity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multimodal_similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_similarity: Option<f64>,
}

impl Scores {
    pub fn grades(&self) -> Grades {
        Grades {
            primary: SimilarityGrade::from_score(self.primary_similarity),
            multimodal: self.multimodal_similarity.map(SimilarityGrade::from_score),
            description: self.description_similarity.map(SimilarityGrade::from_score),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grades {
    pub primary: SimilarityGrade,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multimodal: Option<SimilarityGrade>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<SimilarityGrade>,
}

/// One model's view of the prompt/caption and prompt/description pairs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingModelResult {
    pub model_name: String,
    pub dimensions: usize,
    #[serde(rename = "azureVisionSimilarity")]
    pub caption_similarity: f64,
    #[serde(rename = "gpt4oSimilarity")]
    pub description_similarity: f64,
    pub token_usage: u64,
    pub processing_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmbeddingModelResult {
    /// Zeroed entry for a model whose calls failed.
    pub fn failed(
        model_name: impl Into<String>,
        dimensions: usize,
        elapsed: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            dimensions,
            caption_similarity: 0.0,
            description_similarity: 0.0,
            token_usage: 0,
            processing_time_ms: elapsed.as_millis() as u64,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub image_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
    pub mime_type: String,
    pub prompt_length: usize,
    pub processing_time_ms: u64,
    pub token_usage: UsageSummary,
}

/// Tokens spent on the primary path plus the description call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    #[serde(flatten)]
    pub usage: TokenUsage,
    /// Set when part of the total is estimated from text length.
    pub estimated: bool,
}

/// How the primary similarity was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SimilarityMethod {
    Embedding,
    TokenOverlap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionDetails {
    /// Empty when captioning failed.
    pub generated_caption: String,
    pub confidence: f32,
    pub model_used: String,
    pub method: SimilarityMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionDetails {
    pub generated_description: String,
    pub model_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultimodalDetails {
    pub model_used: String,
    pub dimensions: usize,
}

/// Returned when the request could not be scored at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringFailure {
    pub error: String,
    pub metadata: FailureMetadata,
    #[serde(skip)]
    pub kind: FailureKind,
}

impl ScoringFailure {
    pub fn new(kind: FailureKind, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            error: error.into(),
            metadata: FailureMetadata {
                processing_time_ms: elapsed.as_millis() as u64,
            },
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureMetadata {
    pub processing_time_ms: u64,
}

/// Why a request failed; drives the transport status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request itself was unacceptable.
    Validation,
    /// Something broke while scoring.
    Internal,
}
