//! # Image Scoring
//!
//! Scores how well an image matches a text prompt by combining several
//! independent similarity signals:
//!
//! - **Primary**: prompt vs an auto-generated caption (text embeddings)
//! - **Description**: prompt vs a vision-chat description of the image
//! - **Multimodal**: image vs prompt in a shared image/text vector space
//! - **Model comparison**: the caption and description pairs under every
//!   configured embedding model
//!
//! ## Architecture
//!
//! ```text
//!                       ┌──────────────────┐
//!                       │  ScoringRequest  │
//!                       └────────┬─────────┘
//!                                ▼
//!                       ┌──────────────────┐
//!                       │    validation    │── reject ──► Failure
//!                       └────────┬─────────┘
//!               ┌────────────────┴─────────────────┐
//!               ▼                                  ▼
//!     ┌──────────────────┐             ┌──────────────────────┐
//!     │    multimodal    │             │ caption ∥ description│
//!     │ image ∥ prompt   │             └──────────┬───────────┘
//!     └────────┬─────────┘       ┌────────────────┼────────────────┐
//!              │                 ▼                ▼                ▼
//!              │           ┌──────────┐    ┌─────────────┐  ┌─────────────┐
//!              │           │ primary  │    │ description │  │ comparison  │
//!              │           │(fallback)│    │ similarity  │  │ per model   │
//!              │           └────┬─────┘    └──────┬──────┘  └──────┬──────┘
//!              └────────────────┴─────────────────┴────────────────┘
//!                                ▼
//!                       ┌──────────────────┐
//!                       │  ScoringReport   │
//!                       └──────────────────┘
//! ```
//!
//! Every outbound call goes through a shared [`CallPolicy`] (bounded
//! concurrency, per-call timeout, retries for transient failures).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use imgscore_scoring::{ScoringConfig, ScoringRequest, build_scorer};
//!
//! let mut config = ScoringConfig::default();
//! config.apply_env();
//! let scorer = build_scorer(config, None)?;
//!
//! let response = scorer
//!     .score(ScoringRequest::new(bytes, "a red ceramic mug").with_mime_type("image/png"))
//!     .await;
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod observer;
pub mod orchestrator;
pub mod policy;
pub mod types;
pub mod validation;

pub use config::{
    CacheConfig, CallLimits, EmbeddingModelConfig, OpenAIConfig, OpenAIFlavor, ProvidersConfig,
    ScoringConfig, VisionConfig,
};
pub use descriptor::ServiceDescriptor;
pub use error::{BranchError, Result, ScoringError};
pub use factory::{Providers, build_providers, build_scorer, scorer_from, with_caches};
pub use observer::{
    Branch, BranchEvent, BranchOutcome, RecordingObserver, RequestEvent, RequestOutcome,
    ScoringObserver, TracingObserver,
};
pub use orchestrator::{ImageScorer, ImageScorerBuilder};
pub use policy::CallPolicy;
pub use types::{
    CaptionDetails, DescriptionDetails, EmbeddingModelResult, FailureKind, Grades,
    MultimodalDetails, ReportMetadata, Scores, ScoringFailure, ScoringReport, ScoringRequest,
    ScoringResponse, SimilarityMethod, UsageSummary,
};

// Re-export from dependencies for convenience
pub use imgscore_embeddings::{EmbeddingProvider, SimilarityGrade};
pub use imgscore_vision::{CaptionProvider, DescriptionProvider, MultimodalEmbedder};
