//! Error types for the vision adapters.

use imgscore_embeddings::http::HttpFailure;
use thiserror::Error;

/// Result type alias for vision operations.
pub type Result<T> = std::result::Result<T, VisionError>;

/// Errors that can occur while calling a vision service.
#[derive(Error, Debug)]
pub enum VisionError {
    /// Endpoint or credential missing.
    #[error("vision provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// Provider answered with a non-success status.
    #[error("provider API error: status={status}, body={body}")]
    Api { status: u16, body: String },

    /// Response could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Caption service answered without caption text.
    #[error("no caption generated")]
    NoCaptionGenerated,

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// No image bytes were supplied.
    #[error("image is empty")]
    EmptyImage,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl VisionError {
    /// Whether a retry of the same call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            _ => false,
        }
    }

    /// Server-provided wait hint, when there is one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl From<HttpFailure> for VisionError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::RateLimited { retry_after_secs } => Self::RateLimited { retry_after_secs },
            HttpFailure::Status { status, body } => Self::Api { status, body },
            HttpFailure::Transport(err) => Self::Http(err),
            HttpFailure::Payload(message) => Self::InvalidResponse(message),
        }
    }
}
