use std::path::Path;

use clap::{Args, Subcommand};

use crate::config::{self, Overrides};
use crate::models::ModelRegistry;

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum ConfigSubcommand {
    /// Validate the config file and the resolved model list
    Check,
}

pub fn run(args: ConfigArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ConfigSubcommand::Check => {
            let settings = config::load_settings(config_path, Overrides::default())?;
            let models = ModelRegistry::new(settings.models.clone(), &settings.default_model)?;
            tracing::debug!(
                models = models.allowed().len(),
                persona_file = %settings.persona_file.display(),
                "config resolved"
            );
            println!("config OK: {}", settings.source);
            Ok(())
        }
    }
}
