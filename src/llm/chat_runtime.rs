use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;

use crate::llm::provider::{ProviderError, ProviderKind};

#[derive(Debug)]
pub(crate) enum RequestFailure {
    Request(reqwest::Error),
    Api { status: StatusCode, body: String },
}

impl RequestFailure {
    pub(crate) fn into_provider_error(self, provider: ProviderKind) -> ProviderError {
        match self {
            Self::Request(source) => ProviderError::Request {
                provider,
                source: source.without_url(),
            },
            Self::Api { status, body } => ProviderError::Api {
                provider,
                status,
                message: api_error_message(&body),
            },
        }
    }
}

/// Sends a prepared request once. Non-success statuses are returned with their body.
pub(crate) async fn send_chat_request(
    request: RequestBuilder,
    timeout: Option<Duration>,
) -> Result<reqwest::Response, RequestFailure> {
    let request = match timeout {
        Some(timeout) => request.timeout(timeout),
        None => request,
    };

    let response = request.send().await.map_err(RequestFailure::Request)?;
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(RequestFailure::Api { status, body })
}

/// Extracts the human-readable message from a provider error payload.
///
/// Gemini and OpenAI-compatible APIs both wrap it as `{"error": {"message": ...}}`;
/// some gateways send `{"error": "..."}` or a top-level `message`.
pub(crate) fn api_error_message(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body).ok()?;
    let message = match &payload["error"] {
        Value::String(message) => Some(message.as_str()),
        Value::Object(error) => error.get("message").and_then(Value::as_str),
        _ => None,
    }
    .or_else(|| payload["message"].as_str())?;

    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}
