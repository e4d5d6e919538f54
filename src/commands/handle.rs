use std::io::{self, IsTerminal, Read};
use std::path::Path;

use anyhow::{Context, bail};
use clap::Args;

use crate::commands::ContextArgs;
use crate::config;
use crate::context::BotContext;
use crate::dispatch::dispatch;

#[derive(Debug, Args, Clone)]
pub struct HandleArgs {
    #[command(flatten)]
    pub context: ContextArgs,
    /// Print provider requests as JSON instead of sending them
    #[arg(long)]
    pub dry_run: bool,
    /// Print each reply as one JSON object per line (`null` when ignored)
    #[arg(long)]
    pub json: bool,
    /// Chat messages, handled in order against one shared state.
    /// Read from stdin when omitted.
    #[arg(value_name = "MESSAGE")]
    pub messages: Vec<String>,
}

pub async fn run(args: HandleArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let messages = resolve_messages(args.messages)?;
    let settings = config::load_settings(config_path, args.context.overrides())?;
    let ctx = BotContext::from_settings(&settings, args.dry_run).await?;

    for message in &messages {
        let reply = dispatch(&ctx, message).await;
        if args.json {
            println!("{}", serde_json::to_string(&reply).context("Failed to encode reply")?);
        } else if let Some(reply) = reply {
            println!("{}", reply.text);
        }
    }
    Ok(())
}

fn resolve_messages(messages: Vec<String>) -> anyhow::Result<Vec<String>> {
    if !messages.is_empty() {
        return Ok(messages);
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        bail!("No message provided. Pass MESSAGE or pipe it on stdin.");
    }
    let mut input = String::new();
    stdin
        .lock()
        .read_to_string(&mut input)
        .context("Failed to read message from stdin")?;
    if input.trim().is_empty() {
        bail!("No message provided. Pass MESSAGE or pipe it on stdin.");
    }
    Ok(vec![input])
}
