use crate::error::{Result, VisionError};

/// Resolve an optional setting or report which one is missing.
pub(crate) fn required<'a>(value: Option<&'a String>, name: &str) -> Result<&'a str> {
    value
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| VisionError::ProviderNotConfigured(format!("{name} is not set")))
}
