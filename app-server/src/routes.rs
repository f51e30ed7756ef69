//! HTTP handlers.

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use imgscore_scoring::{FailureKind, ScoringRequest, ScoringResponse, ServiceDescriptor};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Multipart part carrying the image file.
pub const IMAGE_FIELD: &str = "image";
/// Multipart part carrying the prompt text.
pub const PROMPT_FIELD: &str = "prompt";

/// `POST /api/score-image`
///
/// Missing parts are passed through as empty values so the scorer reports
/// them with the same failure body as every other rejected request.
pub async fn score_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Response> {
    let mut multipart = multipart.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let mut image = Vec::new();
    let mut mime_type = None;
    let mut prompt = String::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(IMAGE_FIELD) => {
                mime_type = field
                    .content_type()
                    .filter(|ct| !ct.eq_ignore_ascii_case("application/octet-stream"))
                    .map(str::to_string);
                image = field.bytes().await?.to_vec();
            }
            Some(PROMPT_FIELD) => prompt = field.text().await?,
            other => debug!(field = ?other, "Ignoring multipart field"),
        }
    }

    let mut request = ScoringRequest::new(image, prompt);
    if let Some(mime_type) = mime_type {
        request = request.with_mime_type(mime_type);
    }

    let response = state.scorer.score(request).await;
    Ok((status_for(&response), Json(response)).into_response())
}

fn status_for(response: &ScoringResponse) -> StatusCode {
    match response {
        ScoringResponse::Success(_) => StatusCode::OK,
        ScoringResponse::Failure(failure) => match failure.kind {
            FailureKind::Validation => StatusCode::BAD_REQUEST,
            FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

/// `GET /api/score-image` and `GET /health`
pub async fn describe(State(state): State<AppState>) -> Json<ServiceDescriptor> {
    Json(state.descriptor.as_ref().clone())
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}
