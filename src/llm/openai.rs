use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::llm::chat_runtime::send_chat_request;
use crate::llm::provider::{ChatProvider, ChatRequest, ProviderError, ProviderKind};

const THINK_START: &str = "<think>";
const THINK_END: &str = "</think>";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<AssistantMessage>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Chat-completions client for OpenAI-compatible APIs (Together by default).
#[derive(Debug, Clone)]
pub struct OpenAiCompatible {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    key_env: String,
    timeout: Option<Duration>,
}

impl OpenAiCompatible {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        key_env: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            key_env: key_env.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

fn request_body(request: &ChatRequest) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(ChatMessage::system(system.clone()));
    }
    messages.push(ChatMessage::user(request.user.clone()));

    ChatCompletionRequest {
        model: request.model.clone(),
        messages,
    }
}

fn extract_reply(body: ChatCompletionResponse) -> Option<String> {
    let content = body.choices.into_iter().next()?.message?.content?;
    let content = strip_reasoning(&content);
    (!content.is_empty()).then_some(content)
}

/// Removes the first `<think>...</think>` block and trims the rest.
///
/// Text without a start marker followed by an end marker is returned unchanged.
pub fn strip_reasoning(text: &str) -> String {
    let Some(start) = text.find(THINK_START) else {
        return text.to_string();
    };
    let Some(end) = text[start..].find(THINK_END) else {
        return text.to_string();
    };
    let end = start + end + THINK_END.len();

    let mut stripped = String::with_capacity(text.len() - (end - start));
    stripped.push_str(&text[..start]);
    stripped.push_str(&text[end..]);
    stripped.trim().to_string()
}

#[async_trait]
impl ChatProvider for OpenAiCompatible {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Together
    }

    fn preview(&self, request: &ChatRequest) -> Value {
        json!({
            "provider": self.kind().as_str(),
            "model": request.model,
            "endpoint": self.endpoint,
            "auth": "bearer",
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
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request_body(request));
        let response = send_chat_request(http_request, self.timeout)
            .await
            .map_err(|failure| failure.into_provider_error(provider))?;

        let body: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|source| ProviderError::Request {
                    provider,
                    source: source.without_url(),
                })?;
        tracing::debug!(model = %request.model, "chat completion received");

        extract_reply(body).ok_or(ProviderError::NoValidResponse { provider })
    }
}
