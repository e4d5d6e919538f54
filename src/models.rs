use std::sync::{PoisonError, RwLock};

use thiserror::Error;

use crate::llm::ProviderKind;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";

/// Built-in allow-list used when the config does not provide one.
pub const DEFAULT_MODELS: &[&str] = &[
    "gemini-2.0-flash-lite",
    "gemini-2.0-flash",
    "meta-llama/Llama-3.3-70B-Instruct-Turbo",
    "deepseek-ai/DeepSeek-R1-Distill-Llama-70B-free",
];

/// An allowed model id and the provider family that serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEntry {
    pub id: String,
    pub provider: ProviderKind,
}

impl ModelEntry {
    pub fn new(id: impl Into<String>, provider: ProviderKind) -> Self {
        Self {
            id: id.into(),
            provider,
        }
    }

    /// Entry whose provider is inferred from the id.
    pub fn inferred(id: impl Into<String>) -> Self {
        let id = id.into();
        let provider = ProviderKind::infer(&id);
        Self { id, provider }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Model '{0}' is not available.")]
    NotAllowed(String),
    #[error("The model list is empty.")]
    Empty,
    #[error("Model '{0}' is listed more than once.")]
    Duplicate(String),
}

/// Fixed allow-list plus the process-wide current selection.
///
/// The selection is stored as an index into the list, so it can only ever
/// name an allowed model.
#[derive(Debug)]
pub struct ModelRegistry {
    allowed: Vec<ModelEntry>,
    current: RwLock<usize>,
}

impl ModelRegistry {
    pub fn new(allowed: Vec<ModelEntry>, default_model: &str) -> Result<Self, ModelError> {
        if allowed.is_empty() {
            return Err(ModelError::Empty);
        }
        for (idx, entry) in allowed.iter().enumerate() {
            if allowed[..idx].iter().any(|earlier| earlier.id == entry.id) {
                return Err(ModelError::Duplicate(entry.id.clone()));
            }
        }
        let current = position(&allowed, default_model)
            .ok_or_else(|| ModelError::NotAllowed(default_model.to_string()))?;

        Ok(Self {
            allowed,
            current: RwLock::new(current),
        })
    }

    pub fn with_defaults() -> Self {
        let allowed = DEFAULT_MODELS.iter().copied().map(ModelEntry::inferred).collect();
        Self {
            allowed,
            current: RwLock::new(0),
        }
    }

    pub fn allowed(&self) -> &[ModelEntry] {
        &self.allowed
    }

    pub fn current(&self) -> ModelEntry {
        let idx = *self.current.read().unwrap_or_else(PoisonError::into_inner);
        self.allowed[idx].clone()
    }

    /// Switches the current model. Unknown ids leave the selection unchanged.
    pub fn set_current(&self, id: &str) -> Result<&ModelEntry, ModelError> {
        let idx = position(&self.allowed, id).ok_or_else(|| ModelError::NotAllowed(id.to_string()))?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = idx;
        tracing::info!(model = id, "current model changed");
        Ok(&self.allowed[idx])
    }

    /// Markdown listing of the allow-list and the current selection.
    pub fn describe(&self) -> String {
        let models = self
            .allowed
            .iter()
            .map(|entry| format!("`{}`", entry.id))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "*Available Models:*\n{models}\n\n*Current Model:*\n`{}`",
            self.current().id
        )
    }
}

fn position(allowed: &[ModelEntry], id: &str) -> Option<usize> {
    allowed.iter().position(|entry| entry.id == id.trim())
}
