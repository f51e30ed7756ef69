//! The image scorer: validation, concurrent branches and report assembly.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use futures::future::join_all;
use imgscore_embeddings::{
    EmbeddingError, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, basic_text_similarity,
    cosine_similarity, round_score,
};
use imgscore_vision::{
    CaptionProvider, CaptionResult, DescriptionProvider, DescriptionResult, MultimodalEmbedder,
    TokenUsage,
};
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::config::{EmbeddingModelConfig, ScoringConfig};
use crate::descriptor::ServiceDescriptor;
use crate::error::{BranchError, Result, ScoringError};
use crate::observer::{
    Branch, BranchEvent, BranchOutcome, RequestEvent, RequestOutcome, ScoringObserver,
    TracingObserver,
};
use crate::policy::CallPolicy;
use crate::types::{
    CaptionDetails, DescriptionDetails, EmbeddingModelResult, FailureKind, MultimodalDetails,
    ReportMetadata, Scores, ScoringFailure, ScoringReport, ScoringRequest, ScoringResponse,
    SimilarityMethod, UsageSummary,
};
use crate::validation::{ValidatedRequest, validate_request};

/// Scores how well an image matches a prompt.
///
/// Each request fans out into independent branches:
/// - caption and description fetched concurrently, then prompt vs caption
///   (primary), prompt vs description, and the per-model comparison;
/// - image vs prompt in the multimodal vector space, alongside the above.
///
/// A failing branch degrades or drops only its own output. [`ImageScorer::score`]
/// never returns an error; unusable requests come back as
/// [`ScoringResponse::Failure`].
pub struct ImageScorer {
    embeddings: Arc<dyn EmbeddingProvider>,
    captions: Arc<dyn CaptionProvider>,
    descriptions: Arc<dyn DescriptionProvider>,
    multimodal: Arc<dyn MultimodalEmbedder>,
    observer: Arc<dyn ScoringObserver>,
    policy: CallPolicy,
    deadline: Duration,
    models: Vec<EmbeddingModelConfig>,
    primary: EmbeddingModelConfig,
    allowed_mime_types: Vec<String>,
}

impl ImageScorer {
    /// Create a new image scorer builder.
    pub fn builder() -> ImageScorerBuilder {
        ImageScorerBuilder::new()
    }

    /// Score one request.
    pub async fn score(&self, request: ScoringRequest) -> ScoringResponse {
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();

        let validated = match validate_request(&request, &self.allowed_mime_types) {
            Ok(validated) => validated,
            Err(err) => {
                let message = err.to_string();
                let kind = if err.is_validation() {
                    FailureKind::Validation
                } else {
                    FailureKind::Internal
                };
                self.observer.on_request(&RequestEvent {
                    request_id,
                    outcome: RequestOutcome::Rejected(message.clone()),
                    elapsed: started.elapsed(),
                });
                return ScoringResponse::Failure(ScoringFailure::new(
                    kind,
                    message,
                    started.elapsed(),
                ));
            }
        };

        info!(
            %request_id,
            image_bytes = validated.image.len(),
            mime_type = validated.mime_type.as_str(),
            prompt_chars = validated.prompt.chars().count(),
            "Scoring image"
        );

        let scope = RequestScope {
            request_id: &request_id,
            deadline: tokio::time::Instant::now() + self.deadline,
        };
        let run = self
            .run(&scope, &validated, started)
            .instrument(info_span!("score_image", %request_id));

        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(report) => {
                self.observer.on_request(&RequestEvent {
                    request_id,
                    outcome: RequestOutcome::Completed,
                    elapsed: started.elapsed(),
                });
                ScoringResponse::Success(Box::new(report))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                self.observer.on_request(&RequestEvent {
                    request_id,
                    outcome: RequestOutcome::Crashed(message.clone()),
                    elapsed: started.elapsed(),
                });
                ScoringResponse::Failure(ScoringFailure::new(
                    FailureKind::Internal,
                    format!("scoring failed: {message}"),
                    started.elapsed(),
                ))
            }
        }
    }

    /// Static description of the configured models.
    pub fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(
            self.captions.name(),
            self.descriptions.name(),
            self.multimodal.model_name(),
            &self.primary,
            &self.models,
            &self.allowed_mime_types,
        )
    }

    pub fn policy(&self) -> &CallPolicy {
        &self.policy
    }

    async fn run(
        &self,
        scope: &RequestScope<'_>,
        request: &ValidatedRequest<'_>,
        started: Instant,
    ) -> ScoringReport {
        let (multimodal, text) = tokio::join!(
            self.multimodal_similarity(scope, request.image, request.prompt),
            self.text_pipeline(scope, request),
        );

        let scores = Scores {
            primary_similarity: round_score(text.primary.score),
            multimodal_similarity: multimodal.as_ref().map(|m| round_score(m.score)),
            description_similarity: text.description_similarity.map(round_score),
        };

        let description_usage = text
            .description
            .as_ref()
            .and_then(|d| d.token_usage)
            .unwrap_or_default();
        let token_usage = UsageSummary {
            usage: TokenUsage::new(estimate_tokens(request.prompt), 0) + description_usage,
            estimated: true,
        };

        ScoringReport {
            grades: scores.grades(),
            scores,
            embedding_comparison: text.comparison,
            metadata: ReportMetadata {
                request_id: scope.request_id.to_string(),
                timestamp: Utc::now(),
                image_size: request.image.len(),
                image_width: request.info.width,
                image_height: request.info.height,
                mime_type: request.mime_type.clone(),
                prompt_length: request.prompt.chars().count(),
                processing_time_ms: started.elapsed().as_millis() as u64,
                token_usage,
            },
            caption_details: CaptionDetails {
                generated_caption: text.caption.text,
                confidence: text.caption.confidence,
                model_used: text.caption.model_used,
                method: text.primary.method,
                error: text.caption_error,
            },
            description_details: text.description.map(|d| DescriptionDetails {
                generated_description: d.text,
                model_used: d.model_used,
                token_usage: d.token_usage,
            }),
            multimodal_details: multimodal.map(|m| MultimodalDetails {
                model_used: m.model_used,
                dimensions: m.dimensions,
            }),
        }
    }

    /// Caption and description, then every text-embedding branch.
    async fn text_pipeline(
        &self,
        scope: &RequestScope<'_>,
        request: &ValidatedRequest<'_>,
    ) -> TextScores {
        let (caption, description) = tokio::join!(
            self.fetch_caption(scope, request.image),
            self.fetch_description(scope, request.image, &request.mime_type),
        );
        let (caption, caption_error) = match caption {
            Ok(caption) => (caption, None),
            Err(err) => (CaptionResult::empty(), Some(err.to_string())),
        };

        let description_text = description
            .as_ref()
            .map(|d| d.text.trim())
            .filter(|d| !d.is_empty());
        let (primary, description_similarity, comparison) = tokio::join!(
            self.primary_similarity(scope, request.prompt, &caption.text),
            self.description_similarity(scope, request.prompt, description_text),
            self.compare_models(scope, request.prompt, &caption.text, description_text),
        );

        TextScores {
            caption,
            caption_error,
            primary,
            description,
            description_similarity,
            comparison,
        }
    }

    async fn fetch_caption(
        &self,
        scope: &RequestScope<'_>,
        image: &[u8],
    ) -> std::result::Result<CaptionResult, BranchError> {
        let started = Instant::now();
        let result = self
            .policy
            .call_before(scope.deadline, "caption", || self.captions.caption(image))
            .await;
        let outcome = match &result {
            Ok(_) => BranchOutcome::Succeeded,
            Err(err) => BranchOutcome::Degraded(format!("empty caption substituted: {err}")),
        };
        self.emit(scope, Branch::Caption, outcome, started);
        result
    }

    async fn fetch_description(
        &self,
        scope: &RequestScope<'_>,
        image: &[u8],
        mime_type: &str,
    ) -> Option<DescriptionResult> {
        let started = Instant::now();
        match self
            .policy
            .call_before(scope.deadline, "description", || {
                self.descriptions.describe(image, mime_type)
            })
            .await
        {
            Ok(description) => {
                self.emit(scope, Branch::Description, BranchOutcome::Succeeded, started);
                Some(description)
            }
            Err(err) => {
                self.emit(
                    scope,
                    Branch::Description,
                    BranchOutcome::Failed(err.to_string()),
                    started,
                );
                None
            }
        }
    }

    /// Prompt vs caption with the primary model.
    ///
    /// Falls back to token overlap when there is no caption or embedding fails;
    /// both inputs are free text, so the overlap is still meaningful.
    async fn primary_similarity(
        &self,
        scope: &RequestScope<'_>,
        prompt: &str,
        caption: &str,
    ) -> PrimaryScore {
        let started = Instant::now();
        let failure = if caption.trim().is_empty() {
            "no caption".to_string()
        } else {
            match self.text_similarity(scope, &self.primary, prompt, caption).await {
                Ok(pair) => {
                    self.emit(
                        scope,
                        Branch::PrimarySimilarity,
                        BranchOutcome::Succeeded,
                        started,
                    );
                    return PrimaryScore {
                        score: pair.score,
                        method: SimilarityMethod::Embedding,
                    };
                }
                Err(err) => err.to_string(),
            }
        };

        self.emit(
            scope,
            Branch::PrimarySimilarity,
            BranchOutcome::Degraded(format!("token overlap used: {failure}")),
            started,
        );
        PrimaryScore {
            score: basic_text_similarity(prompt, caption),
            method: SimilarityMethod::TokenOverlap,
        }
    }

    /// Prompt vs description with the primary model. No fallback.
    async fn description_similarity(
        &self,
        scope: &RequestScope<'_>,
        prompt: &str,
        description: Option<&str>,
    ) -> Option<f64> {
        let started = Instant::now();
        let result = match description {
            Some(description) => self
                .text_similarity(scope, &self.primary, prompt, description)
                .await
                .map_err(|err| err.to_string()),
            None => Err("no description".to_string()),
        };
        match result {
            Ok(pair) => {
                self.emit(
                    scope,
                    Branch::DescriptionSimilarity,
                    BranchOutcome::Succeeded,
                    started,
                );
                Some(pair.score)
            }
            Err(reason) => {
                self.emit(
                    scope,
                    Branch::DescriptionSimilarity,
                    BranchOutcome::Failed(reason),
                    started,
                );
                None
            }
        }
    }

    /// Image vs prompt in the shared vector space. Absent on any failure.
    async fn multimodal_similarity(
        &self,
        scope: &RequestScope<'_>,
        image: &[u8],
        prompt: &str,
    ) -> Option<MultimodalScore> {
        let started = Instant::now();
        let (image_vector, text_vector) = tokio::join!(
            self.policy.call_before(scope.deadline, "vectorize_image", || {
                self.multimodal.embed_image(image)
            }),
            self.policy.call_before(scope.deadline, "vectorize_text", || {
                self.multimodal.embed_text(prompt)
            }),
        );

        let scored = match (image_vector, text_vector) {
            (Ok(image_vector), Ok(text_vector)) => cosine_similarity(&image_vector, &text_vector)
                .map(|score| (f64::from(score), image_vector.len()))
                .map_err(BranchError::from),
            (Err(err), _) | (_, Err(err)) => Err(err),
        };

        match scored {
            Ok((score, dimensions)) => {
                self.emit(scope, Branch::Multimodal, BranchOutcome::Succeeded, started);
                Some(MultimodalScore {
                    score,
                    dimensions,
                    model_used: self.multimodal.model_name(),
                })
            }
            Err(err) => {
                self.emit(
                    scope,
                    Branch::Multimodal,
                    BranchOutcome::Failed(err.to_string()),
                    started,
                );
                None
            }
        }
    }

    /// Every configured model, concurrently.
    async fn compare_models(
        &self,
        scope: &RequestScope<'_>,
        prompt: &str,
        caption: &str,
        description: Option<&str>,
    ) -> BTreeMap<String, EmbeddingModelResult> {
        let entries = self.models.iter().map(|model| async move {
            let result = self
                .compare_model(scope, model, prompt, caption, description)
                .await;
            (model.key.clone(), result)
        });
        join_all(entries).await.into_iter().collect()
    }

    async fn compare_model(
        &self,
        scope: &RequestScope<'_>,
        model: &EmbeddingModelConfig,
        prompt: &str,
        caption: &str,
        description: Option<&str>,
    ) -> EmbeddingModelResult {
        let started = Instant::now();
        let caption = Some(caption.trim()).filter(|c| !c.is_empty());

        let compared = async {
            let (prompt_vec, caption_vec, description_vec) = tokio::try_join!(
                self.embed(scope, model, prompt),
                self.embed_optional(scope, model, caption),
                self.embed_optional(scope, model, description),
            )?;
            let caption_similarity = similarity_to(&prompt_vec, caption_vec.as_ref())?;
            let description_similarity = similarity_to(&prompt_vec, description_vec.as_ref())?;
            let tokens = [Some(&prompt_vec), caption_vec.as_ref(), description_vec.as_ref()]
                .into_iter()
                .flatten()
                .map(tokens_used)
                .sum::<u64>();
            Ok::<_, BranchError>((caption_similarity, description_similarity, tokens))
        }
        .await;

        let branch = Branch::ModelComparison(model.key.clone());
        match compared {
            Ok((caption_similarity, description_similarity, token_usage)) => {
                self.emit(scope, branch, BranchOutcome::Succeeded, started);
                EmbeddingModelResult {
                    model_name: model.model.clone(),
                    dimensions: model.dimensions,
                    caption_similarity: round_score(caption_similarity),
                    description_similarity: round_score(description_similarity),
                    token_usage,
                    processing_time_ms: started.elapsed().as_millis() as u64,
                    error: None,
                }
            }
            Err(err) => {
                let message = err.to_string();
                self.emit(
                    scope,
                    branch,
                    BranchOutcome::Failed(message.clone()),
                    started,
                );
                EmbeddingModelResult::failed(
                    model.model.as_str(),
                    model.dimensions,
                    started.elapsed(),
                    message,
                )
            }
        }
    }

    async fn text_similarity(
        &self,
        scope: &RequestScope<'_>,
        model: &EmbeddingModelConfig,
        a: &str,
        b: &str,
    ) -> std::result::Result<PairScore, BranchError> {
        let (a, b) = tokio::try_join!(self.embed(scope, model, a), self.embed(scope, model, b))?;
        let score = cosine_similarity(&a.embedding, &b.embedding)?;
        Ok(PairScore {
            score: f64::from(score),
        })
    }

    async fn embed(
        &self,
        scope: &RequestScope<'_>,
        model: &EmbeddingModelConfig,
        text: &str,
    ) -> std::result::Result<EmbeddingResponse, BranchError> {
        self.policy
            .call_before(scope.deadline, "embedding", || {
                self.embeddings
                    .embed(EmbeddingRequest::new(text).with_model(model.model.as_str()))
            })
            .await
    }

    async fn embed_optional(
        &self,
        scope: &RequestScope<'_>,
        model: &EmbeddingModelConfig,
        text: Option<&str>,
    ) -> std::result::Result<Option<EmbeddingResponse>, BranchError> {
        match text {
            Some(text) => self.embed(scope, model, text).await.map(Some),
            None => Ok(None),
        }
    }

    fn emit(
        &self,
        scope: &RequestScope<'_>,
        branch: Branch,
        outcome: BranchOutcome,
        started: Instant,
    ) {
        debug!(request_id = scope.request_id, %branch, "Branch finished");
        self.observer.on_branch(&BranchEvent {
            request_id: scope.request_id.to_string(),
            branch,
            outcome,
            elapsed: started.elapsed(),
        });
    }
}

/// Identity and deadline shared by every branch of one request.
struct RequestScope<'a> {
    request_id: &'a str,
    deadline: tokio::time::Instant,
}

struct TextScores {
    caption: CaptionResult,
    caption_error: Option<String>,
    primary: PrimaryScore,
    description: Option<DescriptionResult>,
    description_similarity: Option<f64>,
    comparison: BTreeMap<String, EmbeddingModelResult>,
}

struct PrimaryScore {
    score: f64,
    method: SimilarityMethod,
}

struct PairScore {
    score: f64,
}

struct MultimodalScore {
    score: f64,
    dimensions: usize,
    model_used: String,
}

/// Similarity of `prompt` to `other`; zero when `other` was not available.
fn similarity_to(
    prompt: &EmbeddingResponse,
    other: Option<&EmbeddingResponse>,
) -> std::result::Result<f64, EmbeddingError> {
    match other {
        Some(other) => cosine_similarity(&prompt.embedding, &other.embedding).map(f64::from),
        None => Ok(0.0),
    }
}

fn tokens_used(response: &EmbeddingResponse) -> u64 {
    response.tokens_used.unwrap_or(0)
}

/// Rough token count for text the provider did not meter (about 4 chars per token).
fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(4) as u64
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder for [`ImageScorer`].
pub struct ImageScorerBuilder {
    config: ScoringConfig,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    captions: Option<Arc<dyn CaptionProvider>>,
    descriptions: Option<Arc<dyn DescriptionProvider>>,
    multimodal: Option<Arc<dyn MultimodalEmbedder>>,
    observer: Option<Arc<dyn ScoringObserver>>,
}

impl ImageScorerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: ScoringConfig::default(),
            embeddings: None,
            captions: None,
            descriptions: None,
            multimodal: None,
            observer: None,
        }
    }

    /// Models, limits and accepted MIME types. Provider settings are ignored.
    pub fn with_config(mut self, config: ScoringConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(provider);
        self
    }

    pub fn with_caption_provider(mut self, provider: Arc<dyn CaptionProvider>) -> Self {
        self.captions = Some(provider);
        self
    }

    pub fn with_description_provider(mut self, provider: Arc<dyn DescriptionProvider>) -> Self {
        self.descriptions = Some(provider);
        self
    }

    pub fn with_multimodal_embedder(mut self, embedder: Arc<dyn MultimodalEmbedder>) -> Self {
        self.multimodal = Some(embedder);
        self
    }

    /// Defaults to [`TracingObserver`].
    pub fn with_observer(mut self, observer: Arc<dyn ScoringObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the scorer.
    pub fn build(self) -> Result<ImageScorer> {
        self.config.validate()?;
        let primary = self
            .config
            .primary()
            .cloned()
            .ok_or_else(|| ScoringError::Config("primary model missing".to_string()))?;

        Ok(ImageScorer {
            embeddings: self.embeddings.ok_or_else(|| missing("embedding provider"))?,
            captions: self.captions.ok_or_else(|| missing("caption provider"))?,
            descriptions: self
                .descriptions
                .ok_or_else(|| missing("description provider"))?,
            multimodal: self.multimodal.ok_or_else(|| missing("multimodal embedder"))?,
            observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
            policy: CallPolicy::new(&self.config.limits),
            deadline: self.config.limits.request_deadline(),
            primary,
            models: self.config.models,
            allowed_mime_types: self.config.allowed_mime_types,
        })
    }
}

impl Default for ImageScorerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(what: &str) -> ScoringError {
    ScoringError::Config(format!("{what} is not set"))
}
