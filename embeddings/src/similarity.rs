//! Similarity computation for embeddings and free text.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between 0.0 and 1.0. Opposite vectors are clamped to
/// 0.0, and a zero-magnitude input yields 0.0 rather than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b.iter())
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let raw = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(raw.max(0.0))
}

/// Jaccard overlap of the lowercase whitespace tokens of two strings.
///
/// Used only when embeddings are unavailable.
pub fn basic_text_similarity(text1: &str, text2: &str) -> f64 {
    let lower1 = text1.trim().to_lowercase();
    let lower2 = text2.trim().to_lowercase();
    let words1: HashSet<&str> = lower1.split_whitespace().collect();
    let words2: HashSet<&str> = lower2.split_whitespace().collect();

    let union = words1.union(&words2).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = words1.intersection(&words2).count();

    intersection as f64 / union as f64
}

/// Round a score to two decimals for reporting.
pub fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

/// Coarse bucket for a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl SimilarityGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.80 {
            Self::Excellent
        } else if score >= 0.60 {
            Self::Good
        } else if score >= 0.40 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }
}
