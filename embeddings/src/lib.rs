//! # Embeddings
//!
//! Text embeddings and vector similarity for the image scoring pipeline.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors through a remote model
//! - **Similarity**: Clamped cosine similarity plus a token-overlap fallback
//! - **Multiple Providers**: Azure OpenAI deployments and the public OpenAI API
//! - **Caching**: Content-addressed cache keyed by text and model
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► cosine_similarity          │
//! │       │                                   │                     │
//! │       ▼                                   ▼                     │
//! │  Azure/OpenAI   CachedEmbeddingProvider   round_score / grade   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod http;
pub mod provider;
pub mod similarity;

pub use cache::{CacheStats, CachedEmbeddingProvider, ContentCache, ContentKey};
pub use error::{EmbeddingError, Result};
pub use provider::{
    AzureOpenAIProvider, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider,
};
pub use similarity::{
    SimilarityGrade, basic_text_similarity, cosine_similarity, round_score,
};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings (varies by model).
pub const DEFAULT_DIMENSION: usize = 1536; // text-embedding-ada-002 / text-embedding-3-small

/// Known output dimension for an embedding model name.
pub fn model_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-ada-002" | "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}
