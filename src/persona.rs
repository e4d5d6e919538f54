use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

/// A named system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("Failed to read persona file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse persona file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Persona '{name}' in '{}' must map to a string", .path.display())]
    InvalidEntry { path: PathBuf, name: String },
    #[error("Failed to write persona file '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to serialize personas: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Persona mapping backed by a single pretty-printed JSON object.
///
/// Names are lowercased on load, write and lookup. Every mutation rewrites the
/// whole file; concurrent writers are last-write-wins.
#[derive(Debug)]
pub struct PersonaStore {
    path: PathBuf,
    personas: RwLock<Vec<Persona>>,
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl PersonaStore {
    /// Creates an empty store without touching the file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            personas: RwLock::new(Vec::new()),
        }
    }

    /// Creates the store and loads the backing file if it exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PersonaError> {
        let store = Self::new(path);
        store.load().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the in-memory mapping with the file contents.
    ///
    /// A missing file leaves the mapping untouched. Malformed content returns an
    /// error and also leaves it untouched.
    pub async fn load(&self) -> Result<(), PersonaError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "persona file not found, keeping current personas");
                return Ok(());
            }
            Err(source) => {
                return Err(PersonaError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let parsed = parse_personas(&self.path, &raw)?;
        tracing::debug!(path = %self.path.display(), count = parsed.len(), "personas loaded");
        *self.personas.write().await = parsed;
        Ok(())
    }

    /// Entries in file order; new names are appended.
    pub async fn list(&self) -> Vec<Persona> {
        self.personas.read().await.clone()
    }

    pub async fn get(&self, name: &str) -> Option<String> {
        let name = normalize_name(name);
        self.personas
            .read()
            .await
            .iter()
            .find(|persona| persona.name == name)
            .map(|persona| persona.description.clone())
    }

    /// Inserts or overwrites a persona and rewrites the backing file.
    ///
    /// The in-memory mapping only changes once the file write succeeded.
    pub async fn set(&self, name: &str, description: &str) -> Result<Persona, PersonaError> {
        let persona = Persona {
            name: normalize_name(name),
            description: description.trim().to_string(),
        };

        let mut personas = self.personas.write().await;
        let mut updated = personas.clone();
        match updated.iter_mut().find(|entry| entry.name == persona.name) {
            Some(entry) => entry.description = persona.description.clone(),
            None => updated.push(persona.clone()),
        }

        let rendered = render_personas(&updated)?;
        fs::write(&self.path, rendered)
            .await
            .map_err(|source| PersonaError::Write {
                path: self.path.clone(),
                source,
            })?;
        *personas = updated;

        tracing::info!(name = %persona.name, path = %self.path.display(), "persona saved");
        Ok(persona)
    }
}

fn parse_personas(path: &Path, raw: &str) -> Result<Vec<Persona>, PersonaError> {
    let map: Map<String, Value> = serde_json::from_str(raw).map_err(|source| PersonaError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut personas: Vec<Persona> = Vec::with_capacity(map.len());
    for (name, value) in map {
        let Value::String(description) = value else {
            return Err(PersonaError::InvalidEntry {
                path: path.to_path_buf(),
                name,
            });
        };
        let name = normalize_name(&name);
        match personas.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.description = description,
            None => personas.push(Persona { name, description }),
        }
    }
    Ok(personas)
}

fn render_personas(personas: &[Persona]) -> Result<String, PersonaError> {
    let map: Map<String, Value> = personas
        .iter()
        .map(|persona| (persona.name.clone(), Value::String(persona.description.clone())))
        .collect();
    serde_json::to_string_pretty(&map).map_err(PersonaError::Serialize)
}
