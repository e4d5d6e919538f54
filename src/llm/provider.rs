use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Provider family serving a model id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gemini,
    Together,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Gemini, ProviderKind::Together];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Together => "together",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "together" => Some(Self::Together),
            _ => None,
        }
    }

    /// Family used when the config does not name one for a model.
    pub fn infer(model: &str) -> Self {
        if model.contains("gemini") {
            Self::Gemini
        } else {
            Self::Together
        }
    }

    /// Name used in user-facing error replies.
    pub fn label(self) -> &'static str {
        match self {
            Self::Gemini => "Gemini API",
            Self::Together => "Together API",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::Together => "https://api.together.xyz/v1/chat/completions",
        }
    }

    pub fn default_api_key_env(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::Together => "TOGETHER_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound chat request. Built per `/ai` call and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub user: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{key_env} is not set in the environment")]
    MissingApiKey {
        provider: ProviderKind,
        key_env: String,
    },
    #[error("{} request failed: {source}", .provider.label())]
    Request {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },
    #[error("{} error {status}{}", .provider.label(), api_message_suffix(.message))]
    Api {
        provider: ProviderKind,
        status: StatusCode,
        message: Option<String>,
    },
    #[error("No valid response from {}.", .provider.label())]
    NoValidResponse { provider: ProviderKind },
    #[error("no provider is configured for {provider}")]
    Unavailable { provider: ProviderKind },
}

fn api_message_suffix(message: &Option<String>) -> String {
    match message {
        Some(message) => format!(": {message}"),
        None => String::new(),
    }
}

/// Sends a chat request to one provider family.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Describes the outbound request without sending it. Credentials are omitted.
    fn preview(&self, request: &ChatRequest) -> Value;

    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError>;
}

/// Provider implementations keyed by family.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn ChatProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ChatProvider>> {
        self.providers.get(&kind).cloned()
    }

    /// Wraps every registered provider so requests are printed instead of sent.
    pub fn into_dry_run(self) -> Self {
        let providers = self
            .providers
            .into_iter()
            .map(|(kind, inner)| {
                let wrapped: Arc<dyn ChatProvider> = Arc::new(DryRunProvider::new(inner));
                (kind, wrapped)
            })
            .collect();
        Self { providers }
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.providers.keys()).finish()
    }
}

/// Replies with the request preview of the wrapped provider.
pub struct DryRunProvider {
    inner: Arc<dyn ChatProvider>,
}

impl DryRunProvider {
    pub fn new(inner: Arc<dyn ChatProvider>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ChatProvider for DryRunProvider {
    fn kind(&self) -> ProviderKind {
        self.inner.kind()
    }

    fn preview(&self, request: &ChatRequest) -> Value {
        self.inner.preview(request)
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let mut preview = self.inner.preview(request);
        if let Value::Object(map) = &mut preview {
            map.insert("dry_run".to_string(), json!(true));
        }
        Ok(serde_json::to_string_pretty(&preview).unwrap_or_else(|_| preview.to_string()))
    }
}
