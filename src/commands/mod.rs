//! Subcommands of the `personabot` binary.

/// Validate the local config.
pub mod config;
/// Feed chat messages through the dispatcher from the command line.
pub mod handle;
/// Run the Telegram bot.
pub mod run;

use std::path::PathBuf;

use clap::Args;

use crate::config::Overrides;

/// Flags shared by commands that build a bot context.
#[derive(Debug, Args, Clone, Default)]
pub struct ContextArgs {
    /// Persona JSON file (env: PB_PERSONA_FILE)
    #[arg(long, value_name = "PATH")]
    pub persona_file: Option<PathBuf>,
    /// Model selected at startup (env: PB_MODEL)
    #[arg(long, value_name = "ID")]
    pub model: Option<String>,
}

impl ContextArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            persona_file: self.persona_file.clone(),
            model: self.model.clone(),
        }
    }
}
