use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::llm::ProviderKind;
use crate::models::{DEFAULT_MODEL, DEFAULT_MODELS, ModelEntry};

pub const DEFAULT_PERSONA_FILE: &str = "personas.json";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub const DEFAULT_TELEGRAM_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub persona_file: Option<PathBuf>,
    pub default_model: Option<String>,
    pub request_timeout: Option<u64>,
    pub models: Option<Vec<ModelConfig>>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub id: String,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    pub gemini: Option<ProviderConfig>,
    pub together: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    pub api_url: Option<String>,
    pub token_env: Option<String>,
    pub poll_timeout: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid provider '{provider}' for model '{model}'. Supported values: gemini, together.")]
    InvalidProvider { model: String, provider: String },
    #[error("Cannot resolve config path: set PB_CONFIG or HOME/XDG_CONFIG_HOME.")]
    NoConfigPath,
}

/// Where the loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults { missing: Option<PathBuf> },
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Defaults { missing: Some(path) } => {
                write!(f, "built-in defaults (no file at {})", path.display())
            }
            Self::Defaults { missing: None } => f.write_str("built-in defaults"),
        }
    }
}

/// Values supplied on the command line. They win over env and file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub persona_file: Option<PathBuf>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub base_url: String,
    pub api_key_env: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub api_url: String,
    pub token_env: String,
    pub poll_timeout: u64,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: ConfigSource,
    pub persona_file: PathBuf,
    pub models: Vec<ModelEntry>,
    pub default_model: String,
    pub request_timeout: Option<Duration>,
    pub providers: Vec<ProviderSettings>,
    pub telegram: TelegramSettings,
}

/// Loads the config file named by `explicit`, `PB_CONFIG`, or the XDG default.
///
/// An explicitly named file must exist; the default location is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<(ConfigFile, ConfigSource), ConfigError> {
    let (path, required) = match explicit_path(explicit) {
        Some(path) => (path, true),
        None => (default_config_path()?, false),
    };

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
            return Ok((
                ConfigFile::default(),
                ConfigSource::Defaults {
                    missing: Some(path),
                },
            ));
        }
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    let config: ConfigFile =
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
    Ok((config, ConfigSource::File(path)))
}

/// Loads and resolves settings with CLI > env > file > default precedence.
pub fn load_settings(explicit: Option<&Path>, overrides: Overrides) -> Result<Settings, ConfigError> {
    let (file, source) = load_config(explicit)?;
    Settings::resolve(file, source, overrides)
}

impl Settings {
    pub fn resolve(
        file: ConfigFile,
        source: ConfigSource,
        overrides: Overrides,
    ) -> Result<Self, ConfigError> {
        let persona_file = overrides
            .persona_file
            .or_else(|| env_value("PB_PERSONA_FILE").map(PathBuf::from))
            .or(file.persona_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PERSONA_FILE));

        let models = match file.models {
            Some(models) => models
                .into_iter()
                .map(resolve_model)
                .collect::<Result<Vec<_>, _>>()?,
            None => DEFAULT_MODELS
                .iter()
                .copied()
                .map(ModelEntry::inferred)
                .collect(),
        };

        let default_model = overrides
            .model
            .or_else(|| env_value("PB_MODEL"))
            .or(file.default_model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let providers = ProviderKind::ALL
            .into_iter()
            .map(|kind| {
                let configured = match kind {
                    ProviderKind::Gemini => file.providers.gemini.clone(),
                    ProviderKind::Together => file.providers.together.clone(),
                }
                .unwrap_or_default();
                ProviderSettings {
                    kind,
                    base_url: configured
                        .base_url
                        .unwrap_or_else(|| kind.default_base_url().to_string()),
                    api_key_env: configured
                        .api_key_env
                        .unwrap_or_else(|| kind.default_api_key_env().to_string()),
                }
            })
            .collect();

        let telegram = TelegramSettings {
            api_url: file
                .telegram
                .api_url
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            token_env: file
                .telegram
                .token_env
                .unwrap_or_else(|| DEFAULT_TELEGRAM_TOKEN_ENV.to_string()),
            poll_timeout: file
                .telegram
                .poll_timeout
                .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
        };

        Ok(Self {
            source,
            persona_file,
            models,
            default_model,
            request_timeout: file.request_timeout.map(Duration::from_secs),
            providers,
            telegram,
        })
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderSettings> {
        self.providers.iter().find(|provider| provider.kind == kind)
    }
}

fn resolve_model(model: ModelConfig) -> Result<ModelEntry, ConfigError> {
    match model.provider {
        Some(provider) => {
            let kind = ProviderKind::parse(&provider).ok_or_else(|| ConfigError::InvalidProvider {
                model: model.id.clone(),
                provider,
            })?;
            Ok(ModelEntry::new(model.id, kind))
        }
        None => Ok(ModelEntry::inferred(model.id)),
    }
}

/// Reads an environment variable, treating blank values as unset.
pub fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn explicit_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env_value("PB_CONFIG").map(PathBuf::from))
}

fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(xdg) = env_value("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("personabot").join("config.toml"));
    }

    let home = env_value("HOME").ok_or(ConfigError::NoConfigPath)?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("personabot")
        .join("config.toml"))
}
