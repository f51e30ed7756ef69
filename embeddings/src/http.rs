//! Response handling shared by every JSON-over-HTTP provider.

use serde::de::DeserializeOwned;

/// Why a provider response did not yield the expected body.
#[derive(Debug)]
pub enum HttpFailure {
    /// 429, with the `Retry-After` seconds (60 when absent or unparsable).
    RateLimited { retry_after_secs: u64 },
    /// Any other non-success status.
    Status { status: u16, body: String },
    /// The body could not be read.
    Transport(reqwest::Error),
    /// The body was not the expected JSON.
    Payload(String),
}

/// Parse a successful response as `T`, or map the failure into the caller's
/// error type. `what` names the payload in parse errors.
pub async fn read_json<T, E>(response: reqwest::Response, what: &str) -> Result<T, E>
where
    T: DeserializeOwned,
    E: From<HttpFailure>,
{
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return Err(HttpFailure::RateLimited { retry_after_secs }.into());
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(HttpFailure::Status {
            status: status.as_u16(),
            body,
        }
        .into());
    }

    let text = response
        .text()
        .await
        .map_err(|err| E::from(HttpFailure::Transport(err)))?;
    serde_json::from_str(&text)
        .map_err(|e| HttpFailure::Payload(format!("unexpected {what} payload: {e}")).into())
}
