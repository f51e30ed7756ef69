use async_trait::async_trait;
use imgscore_embeddings::Embedding;

use crate::error::Result;
use crate::types::{CaptionResult, DescriptionResult};

/// Image → short caption.
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn caption(&self, image: &[u8]) -> Result<CaptionResult>;
}

/// Image → objective free-text description.
#[async_trait]
pub trait DescriptionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `mime_type` is used to build the inline image payload.
    async fn describe(&self, image: &[u8], mime_type: &str) -> Result<DescriptionResult>;
}

/// Images and text embedded into one shared vector space.
#[async_trait]
pub trait MultimodalEmbedder: Send + Sync {
    fn name(&self) -> &str;

    /// Identifier of the model behind both vectors.
    fn model_name(&self) -> String;

    async fn embed_image(&self, image: &[u8]) -> Result<Embedding>;

    async fn embed_text(&self, text: &str) -> Result<Embedding>;
}
