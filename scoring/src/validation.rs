//! Request validation and image header inspection.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use crate::error::{Result, ScoringError};
use crate::types::ScoringRequest;

/// What the image header says about the upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageInfo {
    /// Content type implied by the magic bytes.
    pub sniffed_mime_type: Option<&'static str>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Read the format and dimensions from the header without decoding pixels.
pub fn inspect_image(bytes: &[u8]) -> ImageInfo {
    let sniffed_mime_type = image::guess_format(bytes)
        .ok()
        .as_ref()
        .map(ImageFormat::to_mime_type);
    let dimensions = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok());

    ImageInfo {
        sniffed_mime_type,
        width: dimensions.map(|(w, _)| w),
        height: dimensions.map(|(_, h)| h),
    }
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest<'a> {
    pub image: &'a [u8],
    pub prompt: &'a str,
    /// Declared content type, or the sniffed one when none was declared.
    pub mime_type: String,
    pub info: ImageInfo,
}

/// Reject requests that must not reach any provider.
pub fn validate_request<'a>(
    request: &'a ScoringRequest,
    allowed_mime_types: &[String],
) -> Result<ValidatedRequest<'a>> {
    if request.image.is_empty() {
        return Err(ScoringError::MissingImage);
    }
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(ScoringError::MissingPrompt);
    }

    let info = inspect_image(&request.image);
    let mime_type = match request.mime_type.as_deref().map(normalize_mime_type) {
        Some(declared) if !declared.is_empty() => declared,
        _ => info
            .sniffed_mime_type
            .map(str::to_string)
            .ok_or_else(|| ScoringError::UnsupportedMimeType("unknown".to_string()))?,
    };

    if !allowed_mime_types
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&mime_type))
    {
        return Err(ScoringError::UnsupportedMimeType(mime_type));
    }

    Ok(ValidatedRequest {
        image: &request.image,
        prompt,
        mime_type,
        info,
    })
}

/// Lowercase, drop parameters and map common aliases.
fn normalize_mime_type(raw: &str) -> String {
    let essence = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-ms-bmp" => "image/bmp".to_string(),
        _ => essence,
    }
}
