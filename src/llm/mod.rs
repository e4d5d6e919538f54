//! Hosted language-model providers.
//!
//! Every provider family implements [`provider::ChatProvider`]; the
//! [`provider::ProviderRegistry`] maps a family to its client so callers never
//! branch on model ids themselves.

pub(crate) mod chat_runtime;
/// Gemini `generateContent` client.
pub mod gemini;
/// OpenAI-compatible chat-completions client.
pub mod openai;
/// Provider-agnostic request types, errors and dispatch.
pub mod provider;

pub use gemini::Gemini;
pub use openai::OpenAiCompatible;
pub use provider::{ChatProvider, ChatRequest, ProviderError, ProviderKind, ProviderRegistry};
