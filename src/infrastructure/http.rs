//! Shared plumbing for OpenAI-compatible HTTP endpoints.

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::domain::DomainError;

const MAX_DETAIL_LEN: usize = 300;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for one-shot calls: the whole exchange must finish within `timeout`.
pub fn request_client(timeout: Duration) -> Result<Client, DomainError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| DomainError::internal(format!("http client: {e}")))
}

/// Client for streamed responses: only a silence longer than `idle` fails,
/// however long the whole answer takes.
pub fn streaming_client(idle: Duration) -> Result<Client, DomainError> {
    Client::builder()
        .read_timeout(idle)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| DomainError::internal(format!("http client: {e}")))
}

pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub fn transport_error(e: reqwest::Error) -> DomainError {
    if e.is_timeout() {
        DomainError::provider("request to the model provider timed out")
    } else {
        DomainError::provider(format!("request to the model provider failed: {e}"))
    }
}

/// Passes successful responses through and maps the rest onto domain errors.
pub async fn check_status(response: Response) -> Result<Response, DomainError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

pub fn status_error(status: StatusCode, body: &str) -> DomainError {
    let detail = error_detail(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DomainError::auth(format!("the provider rejected the API key: {detail}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            DomainError::provider(format!("rate limited by the provider: {detail}"))
        }
        _ => DomainError::provider(format!("provider returned {status}: {detail}")),
    }
}

/// Prefers `error.message` from an OpenAI error body, else the raw text.
pub fn error_detail(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(str::to_string));

    let detail = message.unwrap_or_else(|| body.trim().to_string());
    if detail.chars().count() > MAX_DETAIL_LEN {
        let cut: String = detail.chars().take(MAX_DETAIL_LEN).collect();
        format!("{cut}...")
    } else if detail.is_empty() {
        "no details".to_string()
    } else {
        detail
    }
}
