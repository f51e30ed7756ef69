//! Stub providers for scorer integration tests.
//!
//! The embedder maps each distinct word to its own axis, so cosine similarity
//! between two texts depends only on their shared vocabulary.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use imgscore_embeddings::{
    DEFAULT_DIMENSION, Embedding, EmbeddingError, EmbeddingProvider, EmbeddingRequest,
    EmbeddingResponse, model_dimension,
};
use imgscore_scoring::{CallLimits, ImageScorer, ScoringConfig, ScoringObserver};
use imgscore_vision::{
    CaptionProvider, CaptionResult, DescriptionProvider, DescriptionResult, MultimodalEmbedder,
    TokenUsage, VisionError,
};

pub const PNG_MIME: &str = "image/png";

pub fn fake_image() -> Vec<u8> {
    b"\x89PNG\r\n\x1a\nnot really pixels".to_vec()
}

/// Bag-of-words embedder with one axis per distinct word.
#[derive(Default)]
pub struct BagOfWordsEmbedder {
    vocabulary: Mutex<HashMap<String, usize>>,
    pub calls: AtomicUsize,
    pub failing_models: HashSet<String>,
    pub fail_all: bool,
    pub delay: Option<Duration>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl BagOfWordsEmbedder {
    pub fn failing_model(mut self, model: &str) -> Self {
        self.failing_models.insert(model.to_string());
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn vectorize(&self, text: &str, dimensions: usize) -> Embedding {
        let mut vocabulary = self.vocabulary.lock().unwrap();
        let mut vector = vec![0.0; dimensions];
        for word in text.to_lowercase().split_whitespace() {
            let next = vocabulary.len();
            let axis = *vocabulary.entry(word.to_string()).or_insert(next);
            vector[axis % dimensions] = 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    fn name(&self) -> &str {
        "bag-of-words"
    }

    fn default_model(&self) -> &str {
        "text-embedding-ada-002"
    }

    async fn embed(&self, request: EmbeddingRequest) -> imgscore_embeddings::Result<EmbeddingResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let model = request
            .model
            .unwrap_or_else(|| self.default_model().to_string());
        if self.fail_all || self.failing_models.contains(&model) {
            return Err(EmbeddingError::Api {
                status: 400,
                body: format!("deployment for {model} not found"),
            });
        }

        let dimension = model_dimension(&model).unwrap_or(DEFAULT_DIMENSION);
        Ok(EmbeddingResponse {
            embedding: self.vectorize(&request.text, dimension),
            model,
            dimension,
            tokens_used: Some(request.text.split_whitespace().count() as u64),
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

pub enum CaptionBehavior {
    Text(String),
    Fail,
    /// Fail with a 503 this many times, then succeed.
    FlakyThen(usize, String),
    Slow(Duration),
    Panic,
}

pub struct StubCaptioner {
    pub behavior: CaptionBehavior,
    pub calls: AtomicUsize,
}

impl StubCaptioner {
    pub fn new(behavior: CaptionBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CaptionProvider for StubCaptioner {
    fn name(&self) -> &str {
        "stub-caption"
    }

    async fn caption(&self, _image: &[u8]) -> imgscore_vision::Result<CaptionResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let text = match &self.behavior {
            CaptionBehavior::Text(text) => text.clone(),
            CaptionBehavior::Fail => {
                return Err(VisionError::Api {
                    status: 400,
                    body: "InvalidImageFormat".to_string(),
                });
            }
            CaptionBehavior::FlakyThen(failures, text) => {
                if call < *failures {
                    return Err(VisionError::Api {
                        status: 503,
                        body: "try again".to_string(),
                    });
                }
                text.clone()
            }
            CaptionBehavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                "too late".to_string()
            }
            CaptionBehavior::Panic => panic!("caption decoder exploded"),
        };
        Ok(CaptionResult {
            text,
            confidence: 0.87,
            model_used: "stub-caption-v1".to_string(),
        })
    }
}

pub struct StubDescriber {
    pub text: Option<String>,
    pub calls: AtomicUsize,
}

impl StubDescriber {
    pub fn new(text: Option<&str>) -> Self {
        Self {
            text: text.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DescriptionProvider for StubDescriber {
    fn name(&self) -> &str {
        "stub-chat"
    }

    async fn describe(
        &self,
        _image: &[u8],
        _mime_type: &str,
    ) -> imgscore_vision::Result<DescriptionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.text {
            Some(text) => Ok(DescriptionResult {
                text: text.clone(),
                model_used: "stub-gpt".to_string(),
                token_usage: Some(TokenUsage::new(100, 10)),
            }),
            None => Err(VisionError::InvalidResponse(
                "chat completion has no content".to_string(),
            )),
        }
    }
}

#[derive(Default)]
pub struct StubMultimodal {
    pub image_fails: bool,
    pub text_fails: bool,
    /// Replaces the default `[1, 0, 1]` image vector.
    pub image_vector: Option<Embedding>,
    pub image_calls: AtomicUsize,
    pub text_calls: AtomicUsize,
}

#[async_trait]
impl MultimodalEmbedder for StubMultimodal {
    fn name(&self) -> &str {
        "stub-multimodal"
    }

    fn model_name(&self) -> String {
        "stub-multimodal-1".to_string()
    }

    async fn embed_image(&self, _image: &[u8]) -> imgscore_vision::Result<Embedding> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        if self.image_fails {
            return Err(VisionError::Api {
                status: 415,
                body: "unsupported image".to_string(),
            });
        }
        Ok(self
            .image_vector
            .clone()
            .unwrap_or_else(|| vec![1.0, 0.0, 1.0]))
    }

    async fn embed_text(&self, _text: &str) -> imgscore_vision::Result<Embedding> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        if self.text_fails {
            return Err(VisionError::Api {
                status: 400,
                body: "bad text".to_string(),
            });
        }
        Ok(vec![1.0, 0.0, 0.0])
    }
}

/// One stub of each provider, shared with the scorer so calls can be counted.
pub struct Stubs {
    pub embeddings: Arc<BagOfWordsEmbedder>,
    pub captions: Arc<StubCaptioner>,
    pub descriptions: Arc<StubDescriber>,
    pub multimodal: Arc<StubMultimodal>,
}

impl Stubs {
    pub fn new(caption: &str) -> Self {
        Self {
            embeddings: Arc::new(BagOfWordsEmbedder::default()),
            captions: Arc::new(StubCaptioner::new(CaptionBehavior::Text(
                caption.to_string(),
            ))),
            descriptions: Arc::new(StubDescriber::new(Some(
                "a glossy red ceramic mug on a wooden table",
            ))),
            multimodal: Arc::new(StubMultimodal::default()),
        }
    }

    pub fn with_embeddings(mut self, embeddings: BagOfWordsEmbedder) -> Self {
        self.embeddings = Arc::new(embeddings);
        self
    }

    pub fn with_captions(mut self, behavior: CaptionBehavior) -> Self {
        self.captions = Arc::new(StubCaptioner::new(behavior));
        self
    }

    pub fn with_description(mut self, text: Option<&str>) -> Self {
        self.descriptions = Arc::new(StubDescriber::new(text));
        self
    }

    pub fn with_multimodal(mut self, multimodal: StubMultimodal) -> Self {
        self.multimodal = Arc::new(multimodal);
        self
    }

    pub fn scorer(&self) -> ImageScorer {
        self.scorer_with(test_config(), None)
    }

    pub fn scorer_with(
        &self,
        config: ScoringConfig,
        observer: Option<Arc<dyn ScoringObserver>>,
    ) -> ImageScorer {
        let mut builder = ImageScorer::builder()
            .with_config(config)
            .with_embedding_provider(self.embeddings.clone())
            .with_caption_provider(self.captions.clone())
            .with_description_provider(self.descriptions.clone())
            .with_multimodal_embedder(self.multimodal.clone());
        if let Some(observer) = observer {
            builder = builder.with_observer(observer);
        }
        builder.build().unwrap()
    }

    /// Calls made to any provider.
    pub fn total_calls(&self) -> usize {
        self.embeddings.calls.load(Ordering::SeqCst)
            + self.captions.calls.load(Ordering::SeqCst)
            + self.descriptions.calls.load(Ordering::SeqCst)
            + self.multimodal.image_calls.load(Ordering::SeqCst)
            + self.multimodal.text_calls.load(Ordering::SeqCst)
    }
}

/// Default models with short timeouts and no retries.
pub fn test_config() -> ScoringConfig {
    ScoringConfig {
        limits: CallLimits {
            call_timeout_ms: 2_000,
            max_concurrent_calls: 8,
            max_retries: 0,
            retry_backoff_ms: 1,
            max_backoff_ms: 5,
            request_deadline_ms: 30_000,
        },
        ..Default::default()
    }
}
