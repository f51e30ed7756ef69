//! End-to-end scoring scenarios against stub providers.

mod common;

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use image::{DynamicImage, ImageFormat};
use imgscore_scoring::{
    Branch, BranchOutcome, FailureKind, RecordingObserver, RequestOutcome, ScoringRequest,
    SimilarityGrade, SimilarityMethod,
};
use pretty_assertions::assert_eq;

use common::{
    BagOfWordsEmbedder, CaptionBehavior, PNG_MIME, StubMultimodal, Stubs, fake_image, test_config,
};

fn request(prompt: &str) -> ScoringRequest {
    ScoringRequest::new(fake_image(), prompt).with_mime_type(PNG_MIME)
}

#[tokio::test]
async fn test_matching_caption_scores_high() {
    let stubs = Stubs::new("a red ceramic mug on a table");
    let response = stubs.scorer().score(request("a red ceramic mug")).await;

    let report = response.report().unwrap();
    assert!(
        report.scores.primary_similarity > 0.7,
        "expected high primary similarity, got {}",
        report.scores.primary_similarity
    );
    assert_eq!(report.scores.primary_similarity, 0.82);
    assert_eq!(report.grades.primary, SimilarityGrade::Excellent);
    assert_eq!(report.caption_details.method, SimilarityMethod::Embedding);
    assert_eq!(
        report.caption_details.generated_caption,
        "a red ceramic mug on a table"
    );
    assert_eq!(report.scores.multimodal_similarity, Some(0.71));
    assert!(report.scores.description_similarity.is_some());
    assert_eq!(report.embedding_comparison.len(), 3);
}

#[tokio::test]
async fn test_unrelated_caption_scores_low() {
    let stubs = Stubs::new("a cat sleeping on a couch");
    let response = stubs.scorer().score(request("a spaceship in orbit")).await;

    let report = response.report().unwrap();
    assert!(
        report.scores.primary_similarity < 0.3,
        "expected low primary similarity, got {}",
        report.scores.primary_similarity
    );
    assert_eq!(report.grades.primary, SimilarityGrade::Poor);
}

#[tokio::test]
async fn test_caption_failure_falls_back_to_token_overlap() {
    let observer = Arc::new(RecordingObserver::new());
    let stubs = Stubs::new("unused").with_captions(CaptionBehavior::Fail);
    let scorer = stubs.scorer_with(test_config(), Some(observer.clone()));

    let response = scorer.score(request("a red ceramic mug")).await;

    assert!(response.is_success());
    let report = response.report().unwrap();
    assert_eq!(report.caption_details.generated_caption, "");
    assert_eq!(report.caption_details.confidence, 0.0);
    assert_eq!(report.caption_details.method, SimilarityMethod::TokenOverlap);
    assert!(report.caption_details.error.is_some());
    assert_eq!(report.scores.primary_similarity, 0.0);

    // The rest of the pipeline is unaffected.
    assert!(report.scores.description_similarity.is_some());
    assert!(report.scores.multimodal_similarity.is_some());
    for entry in report.embedding_comparison.values() {
        assert_eq!(entry.caption_similarity, 0.0);
        assert_eq!(entry.error, None);
    }

    assert!(matches!(
        observer.outcome_of(&Branch::Caption),
        Some(BranchOutcome::Degraded(_))
    ));
    assert!(matches!(
        observer.outcome_of(&Branch::PrimarySimilarity),
        Some(BranchOutcome::Degraded(_))
    ));
}

#[tokio::test]
async fn test_embedding_failure_uses_token_overlap_on_caption() {
    let stubs = Stubs::new("a red ceramic mug on a table")
        .with_embeddings(BagOfWordsEmbedder::default().failing());
    let response = stubs.scorer().score(request("a red ceramic mug")).await;

    let report = response.report().unwrap();
    // |{a, red, ceramic, mug}| / |{a, red, ceramic, mug, on, table}|
    assert_eq!(report.scores.primary_similarity, 0.67);
    assert_eq!(report.caption_details.method, SimilarityMethod::TokenOverlap);
    assert_eq!(report.scores.description_similarity, None);
    assert_eq!(report.grades.description, None);
    assert!(report.description_details.is_some());
    assert!(report.scores.multimodal_similarity.is_some());
    assert!(
        report
            .embedding_comparison
            .values()
            .all(|entry| entry.error.is_some())
    );
}

#[tokio::test]
async fn test_multimodal_image_failure_drops_only_multimodal() {
    let stubs = Stubs::new("a red ceramic mug on a table").with_multimodal(StubMultimodal {
        image_fails: true,
        ..Default::default()
    });
    let response = stubs.scorer().score(request("a red ceramic mug")).await;

    let report = response.report().unwrap();
    assert_eq!(report.scores.multimodal_similarity, None);
    assert_eq!(report.multimodal_details, None);
    assert_eq!(report.grades.multimodal, None);
    assert_eq!(stubs.multimodal.text_calls.load(Ordering::SeqCst), 1);

    assert_eq!(report.scores.primary_similarity, 0.82);
    assert!(report.scores.description_similarity.is_some());
    assert_eq!(report.embedding_comparison.len(), 3);

    let json = serde_json::to_value(&response).unwrap();
    assert!(json["scores"].get("multimodalSimilarity").is_none());
    assert!(json.get("multimodalDetails").is_none());
}

#[tokio::test]
async fn test_multimodal_text_failure_drops_only_multimodal() {
    let stubs = Stubs::new("a red ceramic mug on a table").with_multimodal(StubMultimodal {
        text_fails: true,
        ..Default::default()
    });
    let response = stubs.scorer().score(request("a red ceramic mug")).await;

    let report = response.report().unwrap();
    assert_eq!(report.scores.multimodal_similarity, None);
    assert_eq!(report.multimodal_details, None);
    assert_eq!(stubs.multimodal.image_calls.load(Ordering::SeqCst), 1);
    assert_eq!(stubs.multimodal.text_calls.load(Ordering::SeqCst), 1);

    assert_eq!(report.scores.primary_similarity, 0.82);
    assert!(report.scores.description_similarity.is_some());
    assert!(report.description_details.is_some());
    assert_eq!(report.embedding_comparison.len(), 3);
    assert!(
        report
            .embedding_comparison
            .values()
            .all(|entry| entry.error.is_none())
    );
}

#[tokio::test]
async fn test_multimodal_dimension_mismatch_drops_only_multimodal() {
    let observer = Arc::new(RecordingObserver::new());
    let stubs = Stubs::new("a red ceramic mug on a table").with_multimodal(StubMultimodal {
        image_vector: Some(vec![1.0, 0.0, 1.0, 0.0]),
        ..Default::default()
    });
    let scorer = stubs.scorer_with(test_config(), Some(observer.clone()));

    let response = scorer.score(request("a red ceramic mug")).await;

    let report = response.report().unwrap();
    assert_eq!(report.scores.multimodal_similarity, None);
    assert_eq!(report.multimodal_details, None);
    assert_eq!(report.grades.multimodal, None);
    match observer.outcome_of(&Branch::Multimodal) {
        Some(BranchOutcome::Failed(reason)) => assert!(reason.contains("dimension"), "{reason}"),
        other => panic!("unexpected multimodal outcome: {other:?}"),
    }

    assert_eq!(report.scores.primary_similarity, 0.82);
    assert!(report.scores.description_similarity.is_some());
    assert_eq!(report.embedding_comparison.len(), 3);
}

#[tokio::test]
async fn test_description_failure_zeroes_only_description_scores() {
    let observer = Arc::new(RecordingObserver::new());
    let stubs = Stubs::new("a red ceramic mug on a table").with_description(None);
    let scorer = stubs.scorer_with(test_config(), Some(observer.clone()));

    let response = scorer.score(request("a red ceramic mug")).await;

    let report = response.report().unwrap();
    assert_eq!(report.scores.description_similarity, None);
    assert_eq!(report.grades.description, None);
    assert_eq!(report.description_details, None);
    assert!(matches!(
        observer.outcome_of(&Branch::Description),
        Some(BranchOutcome::Failed(_))
    ));

    assert_eq!(report.scores.primary_similarity, 0.82);
    assert_eq!(report.scores.multimodal_similarity, Some(0.71));
    assert_eq!(report.embedding_comparison.len(), 3);
    for entry in report.embedding_comparison.values() {
        assert_eq!(entry.caption_similarity, 0.82);
        assert_eq!(entry.description_similarity, 0.0);
        assert_eq!(entry.error, None);
    }

    // No description means no chat tokens on top of the prompt estimate.
    assert_eq!(report.metadata.token_usage.usage.completion_tokens, 0);

    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("descriptionDetails").is_none());
    assert!(json["scores"].get("descriptionSimilarity").is_none());
    assert_eq!(json["embeddingComparison"]["ada002"]["gpt4oSimilarity"], 0.0);
}

#[tokio::test]
async fn test_blank_description_is_treated_as_missing_text() {
    let stubs = Stubs::new("a red ceramic mug on a table").with_description(Some("   "));
    let response = stubs.scorer().score(request("a red ceramic mug")).await;

    let report = response.report().unwrap();
    assert_eq!(report.scores.description_similarity, None);
    for entry in report.embedding_comparison.values() {
        assert_eq!(entry.caption_similarity, 0.82);
        assert_eq!(entry.description_similarity, 0.0);
        assert_eq!(entry.error, None);
    }
}

#[tokio::test]
async fn test_model_comparison_isolates_failing_model() {
    let stubs = Stubs::new("a red ceramic mug on a table")
        .with_embeddings(BagOfWordsEmbedder::default().failing_model("text-embedding-3-small"));
    let response = stubs.scorer().score(request("a red ceramic mug")).await;

    let comparison = &response.report().unwrap().embedding_comparison;
    assert_eq!(comparison.len(), 3);

    let ada = &comparison["ada002"];
    assert_eq!(ada.model_name, "text-embedding-ada-002");
    assert_eq!(ada.dimensions, 1536);
    assert_eq!(ada.caption_similarity, 0.82);
    assert!(ada.description_similarity > 0.0);
    assert!(ada.token_usage > 0);
    assert_eq!(ada.error, None);

    let small = &comparison["embedding3Small"];
    assert_eq!(small.dimensions, 1536);
    assert_eq!(small.caption_similarity, 0.0);
    assert_eq!(small.description_similarity, 0.0);
    assert_eq!(small.token_usage, 0);
    assert!(small.error.as_deref().unwrap().contains("400"));

    let large = &comparison["embedding3Large"];
    assert_eq!(large.dimensions, 3072);
    assert_eq!(large.caption_similarity, 0.82);
    assert_eq!(large.error, None);

    // The primary score uses ada002 and is unaffected.
    assert_eq!(response.report().unwrap().scores.primary_similarity, 0.82);
}

#[tokio::test]
async fn test_missing_prompt_makes_no_provider_calls() {
    let observer = Arc::new(RecordingObserver::new());
    let stubs = Stubs::new("a red ceramic mug on a table");
    let scorer = stubs.scorer_with(test_config(), Some(observer.clone()));

    let response = scorer.score(request("  ")).await;

    let failure = response.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::Validation);
    assert_eq!(failure.error, "prompt is required");
    assert_eq!(stubs.total_calls(), 0);
    assert!(observer.branch_events().is_empty());
    assert!(matches!(
        observer.request_events()[0].outcome,
        RequestOutcome::Rejected(_)
    ));

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["success"], false);
    assert!(json["metadata"]["processingTimeMs"].is_u64());
}

#[tokio::test]
async fn test_unsupported_type_makes_no_provider_calls() {
    let stubs = Stubs::new("a red ceramic mug on a table");
    let response = stubs
        .scorer()
        .score(ScoringRequest::new(fake_image(), "a red ceramic mug").with_mime_type("application/pdf"))
        .await;

    assert_eq!(
        response.failure().map(|f| f.kind),
        Some(FailureKind::Validation)
    );
    assert_eq!(stubs.total_calls(), 0);
}

#[tokio::test]
async fn test_response_json_shape() {
    let stubs = Stubs::new("a red ceramic mug on a table");
    let response = stubs.scorer().score(request("a red ceramic mug")).await;

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["scores"]["primarySimilarity"], 0.82);
    assert_eq!(json["grades"]["primary"], "excellent");
    assert_eq!(json["captionDetails"]["method"], "embedding");
    assert_eq!(json["captionDetails"]["modelUsed"], "stub-caption-v1");
    assert_eq!(json["descriptionDetails"]["modelUsed"], "stub-gpt");
    assert_eq!(json["multimodalDetails"]["dimensions"], 3);

    let large = &json["embeddingComparison"]["embedding3Large"];
    assert_eq!(large["dimensions"], 3072);
    assert!(large["azureVisionSimilarity"].is_f64());
    assert!(large["gpt4oSimilarity"].is_f64());
    assert!(large.get("error").is_none());
}

#[tokio::test]
async fn test_metadata_reports_image_and_usage() {
    let mut png = Vec::new();
    DynamicImage::new_rgb8(8, 6)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();
    let image_size = png.len();

    let stubs = Stubs::new("a red ceramic mug on a table");
    let response = stubs
        .scorer()
        .score(ScoringRequest::new(png, "a red ceramic mug"))
        .await;

    let metadata = &response.report().unwrap().metadata;
    assert_eq!(metadata.mime_type, "image/png");
    assert_eq!(metadata.image_size, image_size);
    assert_eq!(metadata.image_width, Some(8));
    assert_eq!(metadata.image_height, Some(6));
    assert_eq!(metadata.prompt_length, 17);
    assert!(!metadata.request_id.is_empty());

    // 17 prompt chars estimate to 5 tokens, plus 100/10 from the description call.
    let usage = metadata.token_usage;
    assert!(usage.estimated);
    assert_eq!(usage.usage.prompt_tokens, 105);
    assert_eq!(usage.usage.completion_tokens, 10);
    assert_eq!(usage.usage.total_tokens, 115);
}

#[tokio::test]
async fn test_every_similarity_is_within_unit_range() {
    let prompts = [
        "a red ceramic mug",
        "a spaceship in orbit",
        "glossy wooden table with a red mug",
    ];
    let stubs = Stubs::new("a red ceramic mug on a table");
    let scorer = stubs.scorer();

    for prompt in prompts {
        let response = scorer.score(request(prompt)).await;
        let report = response.report().unwrap();
        let mut values = vec![report.scores.primary_similarity];
        values.extend(report.scores.multimodal_similarity);
        values.extend(report.scores.description_similarity);
        for entry in report.embedding_comparison.values() {
            values.push(entry.caption_similarity);
            values.push(entry.description_similarity);
        }
        for value in values {
            assert!(
                (0.0..=1.0).contains(&value),
                "similarity {value} out of range for prompt {prompt:?}"
            );
        }
    }
}
