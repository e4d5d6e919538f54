use std::io;
use std::path::PathBuf;
use std::process;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use personabot::commands::config::{self, ConfigArgs};
use personabot::commands::handle::{self, HandleArgs};
use personabot::commands::run::{self, RunArgs};
use personabot::logging::{self, Verbosity};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("PB_GIT_SHA"),
    ", built ",
    env!("PB_BUILD_TS"),
    ")"
);

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  TELEGRAM_BOT_TOKEN=... GEMINI_API_KEY=... personabot run\n  personabot handle \"/persona [coder] You write terse code.\" \"/persona\"\n  personabot handle --dry-run \"/ai [coder] explain recursion\"\n  personabot config check\n  personabot completion bash > ~/.local/share/bash-completion/completions/personabot";

const HANDLE_HELP_EXAMPLES: &str = "Examples:\n  personabot handle \"/model\"\n  personabot handle \"/model meta-llama/Llama-3.3-70B-Instruct-Turbo\" \"/ai hello\"\n  echo \"/ai summarize this\" | personabot handle --dry-run --json";

#[derive(Debug, Parser)]
#[command(
    name = "personabot",
    about = "Telegram bot relaying prompts to hosted language models",
    version = VERSION,
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    /// Config file (env: PB_CONFIG)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the Telegram bot")]
    Run(RunArgs),
    #[command(about = "Handle chat messages locally and print the replies", after_help = HANDLE_HELP_EXAMPLES)]
    Handle(HandleArgs),
    #[command(about = "Manage local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "personabot", &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "personabot", &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "personabot", &mut io::stdout()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let service = matches!(cli.command, Commands::Run(_));
    logging::init(Verbosity::from_flags(cli.verbose, cli.quiet), service);

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Run(args) => run::run(args, config_path).await,
        Commands::Handle(args) => handle::run(args, config_path).await,
        Commands::Config(args) => config::run(args, config_path),
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("{err:#}");
        process::exit(1);
    }
}
