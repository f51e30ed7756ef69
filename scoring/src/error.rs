//! Error types for the image scorer.

use std::time::Duration;

use imgscore_embeddings::EmbeddingError;
use imgscore_vision::VisionError;
use thiserror::Error;

/// Result type alias for scorer construction and validation.
pub type Result<T> = std::result::Result<T, ScoringError>;

/// Errors surfaced before or outside the scoring branches.
#[derive(Error, Debug)]
pub enum ScoringError {
    /// The request carried no image bytes.
    #[error("image is required")]
    MissingImage,

    /// The prompt was missing or blank.
    #[error("prompt is required")]
    MissingPrompt,

    /// The upload's content type is not accepted.
    #[error("unsupported image type `{0}`")]
    UnsupportedMimeType(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Embedding provider setup error.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vision provider setup error.
    #[error("vision error: {0}")]
    Vision(#[from] VisionError),
}

impl ScoringError {
    /// Whether the error describes a bad request rather than a server fault.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingImage | Self::MissingPrompt | Self::UnsupportedMimeType(_)
        )
    }
}

/// Failure of a single outbound call inside a scoring branch.
///
/// Branch failures never fail the request; they degrade or drop the branch.
#[derive(Error, Debug)]
pub enum BranchError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Vision(#[from] VisionError),

    /// The call exceeded the per-call timeout.
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The request deadline expired before the call finished.
    #[error("{operation} abandoned at the request deadline")]
    DeadlineExceeded { operation: &'static str },

    /// The outbound call limiter was shut down.
    #[error("call limiter closed")]
    LimiterClosed,
}

impl BranchError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Embedding(err) => err.is_transient(),
            Self::Vision(err) => err.is_transient(),
            Self::Timeout { .. } => true,
            Self::DeadlineExceeded { .. } | Self::LimiterClosed => false,
        }
    }

    /// Server-requested delay before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        let secs = match self {
            Self::Embedding(err) => err.retry_after_secs(),
            Self::Vision(err) => err.retry_after_secs(),
            _ => None,
        };
        secs.map(Duration::from_secs)
    }
}
