//! Chat command classification and handling.
//!
//! [`dispatch`] turns one inbound text message into an optional [`Reply`].
//! It never talks to the chat transport; callers decide how to deliver the
//! reply.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::context::BotContext;
use crate::llm::{ChatRequest, ProviderError};
use crate::markdown::escape_markdown_v2;
use crate::persona::{Persona, normalize_name};

pub const HELP_TEXT: &str = "\
- Use \"/ai your prompt\" to send a prompt to the current model. Put a \"[name]\" tag before the prompt to answer in that persona.

- Use \"/persona [name] persona description\" to add or update a persona. Names may contain letters, digits, \"_\" and \"-\". Send \"/persona\" alone to list the saved personas.

- Use \"/model\" to see the available models and the one in use. Add a model id to switch, for example \"/model gemini-2.0-flash\".

- Use \"/info\" to show these instructions again.";

pub const PERSONA_FORMAT_ERROR: &str =
    "Error: Please provide a valid persona format: /persona [name] description";
pub const EMPTY_PROMPT_ERROR: &str = "Error: Please provide a message after /ai.";

static PERSONA_ARGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\[\s*([\w-]+)\s*\]\s*(.*)$").expect("persona pattern is valid"));
static AI_ARGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\[([\w-]+)\](.*)$").expect("ai pattern is valid"));

/// Markup dialect of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    Markdown,
    MarkdownV2,
}

impl ParseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "Markdown",
            Self::MarkdownV2 => "MarkdownV2",
        }
    }
}

/// Outbound reply text.
///
/// `quote` asks the transport to send it as a reply to the originating message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    pub parse_mode: Option<ParseMode>,
    pub quote: bool,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: None,
            quote: false,
        }
    }

    pub fn quoted(text: impl Into<String>) -> Self {
        Self {
            quote: true,
            ..Self::plain(text)
        }
    }

    fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = Some(parse_mode);
        self
    }
}

/// A recognised chat command and its trimmed argument text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Help,
    Persona(&'a str),
    Model(&'a str),
    Ai(&'a str),
}

/// Classifies a message by its first word. `/cmd@botname` is accepted.
pub fn parse_command(text: &str) -> Option<Command<'_>> {
    let text = text.trim_start();
    let (token, rest) = match text.find(char::is_whitespace) {
        Some(idx) => text.split_at(idx),
        None => (text, ""),
    };
    let name = token.split_once('@').map_or(token, |(name, _)| name);
    let args = rest.trim();

    match name {
        "/info" | "/start" => Some(Command::Help),
        "/persona" => Some(Command::Persona(args)),
        "/model" => Some(Command::Model(args)),
        "/ai" => Some(Command::Ai(args)),
        _ => None,
    }
}

/// Splits `[name] description` into a normalized name and trimmed description.
///
/// Names follow the same character set as `/ai` persona tags.
pub fn parse_persona_args(args: &str) -> Option<(String, String)> {
    let captures = PERSONA_ARGS.captures(args)?;
    let name = normalize_name(&captures[1]);
    let description = captures[2].trim().to_string();
    if name.is_empty() || description.is_empty() {
        return None;
    }
    Some((name, description))
}

/// Splits an optional leading `[persona]` tag from the `/ai` prompt.
pub fn parse_ai_args(args: &str) -> (Option<&str>, &str) {
    match AI_ARGS.captures(args) {
        Some(captures) => {
            let persona = captures.get(1).map(|m| m.as_str());
            let prompt = captures.get(2).map_or("", |m| m.as_str().trim());
            (persona, prompt)
        }
        None => (None, args.trim()),
    }
}

/// Handles one inbound message. Unrecognised messages produce no reply.
pub async fn dispatch(ctx: &BotContext, text: &str) -> Option<Reply> {
    let command = parse_command(text)?;
    tracing::debug!(?command, "dispatching command");

    let reply = match command {
        Command::Help => Reply::plain(HELP_TEXT),
        Command::Persona(args) => persona_command(ctx, args).await,
        Command::Model(args) => model_command(ctx, args),
        Command::Ai(args) => ai_command(ctx, args).await,
    };
    Some(reply)
}

async fn persona_command(ctx: &BotContext, args: &str) -> Reply {
    if let Err(err) = ctx.personas.load().await {
        tracing::warn!(error = %err, "persona reload failed");
        return Reply::quoted(format!("Error: {err}"));
    }

    if args.is_empty() {
        let personas = ctx.personas.list().await;
        return Reply::quoted(render_persona_list(&personas)).with_parse_mode(ParseMode::MarkdownV2);
    }

    let Some((name, description)) = parse_persona_args(args) else {
        return Reply::plain(PERSONA_FORMAT_ERROR);
    };
    match ctx.personas.set(&name, &description).await {
        Ok(persona) => Reply::plain(format!("Persona '{}' saved successfully!", persona.name)),
        Err(err) => {
            tracing::error!(error = %err, "persona save failed");
            Reply::plain(format!("Error: {err}"))
        }
    }
}

/// MarkdownV2 persona list, one expandable block quote per persona.
pub fn render_persona_list(personas: &[Persona]) -> String {
    if personas.is_empty() {
        return "*Available Personas:*\n\n_No personas saved yet\\._".to_string();
    }

    let blocks = personas
        .iter()
        .map(|persona| {
            // Names from a hand-edited file may span lines; the quote must not.
            let name = persona.name.lines().collect::<Vec<_>>().join(" ");
            let mut block = format!("**>*{}*", escape_markdown_v2(&name));
            for line in persona.description.lines() {
                block.push_str("\n>");
                block.push_str(&escape_markdown_v2(line));
            }
            block.push_str("\n>||");
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("*Available Personas:*\n\n{blocks}")
}

fn model_command(ctx: &BotContext, args: &str) -> Reply {
    if args.is_empty() {
        return Reply::quoted(ctx.models.describe()).with_parse_mode(ParseMode::Markdown);
    }

    match ctx.models.set_current(args) {
        Ok(entry) => Reply::plain(format!("Model set to '{}'.", entry.id)),
        Err(err) => Reply::plain(format!("Error: {err} Send /model to list models.")),
    }
}

async fn ai_command(ctx: &BotContext, args: &str) -> Reply {
    let (persona, prompt) = parse_ai_args(args);
    if prompt.is_empty() {
        return Reply::quoted(EMPTY_PROMPT_ERROR);
    }

    let system = match persona {
        Some(name) => ctx.personas.get(name).await,
        None => None,
    };
    let model = ctx.models.current();
    tracing::info!(
        model = %model.id,
        provider = %model.provider,
        persona = persona.unwrap_or("none"),
        persona_found = system.is_some(),
        "processing ai request"
    );
    tracing::debug!(prompt, "ai prompt");

    let request = ChatRequest {
        model: model.id,
        system,
        user: prompt.to_string(),
    };
    let result = match ctx.providers.get(model.provider) {
        Some(provider) => provider.complete(&request).await,
        None => Err(ProviderError::Unavailable {
            provider: model.provider,
        }),
    };

    match result {
        Ok(reply) => {
            tracing::debug!(reply = %reply, "ai reply");
            Reply::quoted(reply)
        }
        Err(err) => {
            tracing::warn!(error = %err, "ai request failed");
            Reply::quoted(format!("Error: {err}"))
        }
    }
}
