use std::sync::Arc;

use anyhow::Context;

use crate::config::{Settings, env_value};
use crate::llm::{Gemini, OpenAiCompatible, ProviderKind, ProviderRegistry};
use crate::models::ModelRegistry;
use crate::persona::PersonaStore;

/// Shared state for every message handler, built once at startup.
#[derive(Debug)]
pub struct BotContext {
    pub personas: PersonaStore,
    pub models: ModelRegistry,
    pub providers: ProviderRegistry,
}

impl BotContext {
    pub fn new(personas: PersonaStore, models: ModelRegistry, providers: ProviderRegistry) -> Self {
        Self {
            personas,
            models,
            providers,
        }
    }

    /// Loads personas, validates the model list and builds provider clients.
    ///
    /// A malformed persona file or a default model outside the allow-list is
    /// fatal here.
    pub async fn from_settings(settings: &Settings, dry_run: bool) -> anyhow::Result<Self> {
        let personas = PersonaStore::open(&settings.persona_file).await?;
        let models = ModelRegistry::new(settings.models.clone(), &settings.default_model)
            .context("Invalid model configuration")?;

        let mut providers = build_providers(settings);
        if dry_run {
            providers = providers.into_dry_run();
        }

        tracing::info!(
            persona_file = %settings.persona_file.display(),
            personas = personas.list().await.len(),
            model = %models.current().id,
            dry_run,
            "bot context ready"
        );
        Ok(Self::new(personas, models, providers))
    }
}

/// Builds one client per provider family. Credentials are read from the
/// environment now; a missing key only fails when that provider is used.
pub fn build_providers(settings: &Settings) -> ProviderRegistry {
    let client = reqwest::Client::new();
    let mut registry = ProviderRegistry::new();

    for provider in &settings.providers {
        let api_key = env_value(&provider.api_key_env);
        if api_key.is_none() {
            tracing::debug!(provider = %provider.kind, key_env = %provider.api_key_env, "api key not set");
        }
        match provider.kind {
            ProviderKind::Gemini => registry.register(Arc::new(
                Gemini::new(
                    client.clone(),
                    &provider.base_url,
                    api_key,
                    &provider.api_key_env,
                )
                .with_timeout(settings.request_timeout),
            )),
            ProviderKind::Together => registry.register(Arc::new(
                OpenAiCompatible::new(
                    client.clone(),
                    &provider.base_url,
                    api_key,
                    &provider.api_key_env,
                )
                .with_timeout(settings.request_timeout),
            )),
        }
    }
    registry
}
