use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::llm::chat_runtime::send_chat_request;
use crate::llm::provider::{ChatProvider, ChatRequest, ProviderError, ProviderKind};

/// Instruction sent when no persona is selected.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful assistant.";

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: Option<String>,
}

impl Content {
    fn text(text: &str) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct Gemini {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    key_env: String,
    timeout: Option<Duration>,
}

impl Gemini {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        key_env: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            key_env: key_env.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

fn request_body(request: &ChatRequest) -> GenerateContentRequest {
    let system = request
        .system
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_INSTRUCTION);
    GenerateContentRequest {
        system_instruction: Content::text(system),
        contents: vec![Content::text(&request.user)],
    }
}

fn extract_reply(body: GenerateContentResponse) -> Option<String> {
    let text = body
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()?
        .text?;
    (!text.trim().is_empty()).then_some(text)
}

#[async_trait]
impl ChatProvider for Gemini {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn preview(&self, request: &ChatRequest) -> Value {
        json!({
            "provider": self.kind().as_str(),
            "model": request.model,
            "endpoint": self.endpoint(&request.model),
            "auth": "query:key",
            "body": request_body(request),
        })
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let provider = self.kind();
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingApiKey {
                provider,
                key_env: self.key_env.clone(),
            })?;

        let http_request = self
            .client
            .post(self.endpoint(&request.model))
            .query(&[("key", api_key)])
            .json(&request_body(request));
        let response = send_chat_request(http_request, self.timeout)
            .await
            .map_err(|failure| failure.into_provider_error(provider))?;

        let body: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|source| ProviderError::Request {
                    provider,
                    source: source.without_url(),
                })?;
        tracing::debug!(
            model = %request.model,
            candidates = body.candidates.len(),
            "generateContent received"
        );

        extract_reply(body).ok_or(ProviderError::NoValidResponse { provider })
    }
}
