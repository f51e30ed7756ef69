//! # Vision
//!
//! Adapters that turn image bytes into something comparable with a prompt:
//!
//! - **Captions**: short objective captions from an image-analysis service
//! - **Descriptions**: ~25-word descriptions from a vision-capable chat model
//! - **Multimodal embeddings**: image and text vectors in one shared space
//!
//! Every adapter sits behind a trait so the scorer can swap in cached or
//! stubbed implementations.

pub mod cache;
pub mod caption;
pub mod description;
pub mod error;
mod http;
pub mod multimodal;
pub mod traits;
pub mod types;

pub use cache::{CachedCaptionProvider, CachedDescriptionProvider, CachedMultimodalEmbedder};
pub use caption::AzureCaptionProvider;
pub use description::{ChatVisionProvider, DESCRIPTION_SYSTEM_PROMPT};
pub use error::{Result, VisionError};
pub use multimodal::AzureMultimodalEmbedder;
pub use traits::{CaptionProvider, DescriptionProvider, MultimodalEmbedder};
pub use types::{CaptionResult, DescriptionResult, TokenUsage};
