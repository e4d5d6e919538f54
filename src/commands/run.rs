use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use clap::Args;
use tokio::time::sleep;

use crate::commands::ContextArgs;
use crate::config::{self, env_value};
use crate::context::BotContext;
use crate::dispatch::{Reply, dispatch};
use crate::telegram::{TelegramClient, TelegramError, Update};

const POLL_ERROR_PAUSE: Duration = Duration::from_secs(3);

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub context: ContextArgs,
}

pub async fn run(args: RunArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let settings = config::load_settings(config_path, args.context.overrides())?;
    let token = env_value(&settings.telegram.token_env)
        .ok_or_else(|| anyhow!("{} is not set in the environment", settings.telegram.token_env))?;

    let ctx = Arc::new(BotContext::from_settings(&settings, false).await?);
    let telegram = Arc::new(TelegramClient::new(
        reqwest::Client::new(),
        &settings.telegram.api_url,
        &token,
    ));

    tracing::info!(source = %settings.source, "bot started, polling for messages");
    tokio::select! {
        () = poll_loop(ctx, telegram, settings.telegram.poll_timeout) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("shutdown requested");
        }
    }
    Ok(())
}

async fn poll_loop(ctx: Arc<BotContext>, telegram: Arc<TelegramClient>, poll_timeout: u64) {
    let mut offset = 0;
    loop {
        let updates = match telegram.get_updates(offset, poll_timeout).await {
            Ok(updates) => updates,
            Err(err) => {
                tracing::warn!(error = %err, "polling failed");
                sleep(POLL_ERROR_PAUSE).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            tokio::spawn(handle_update(Arc::clone(&ctx), Arc::clone(&telegram), update));
        }
    }
}

async fn handle_update(ctx: Arc<BotContext>, telegram: Arc<TelegramClient>, update: Update) {
    let Some(message) = update.message else {
        return;
    };
    let Some(text) = message.text.as_deref() else {
        return;
    };
    let Some(reply) = dispatch(&ctx, text).await else {
        return;
    };

    let Err(err) = telegram
        .send_reply(message.chat.id, message.message_id, &reply)
        .await
    else {
        return;
    };
    tracing::error!(chat_id = message.chat.id, error = %err, "failed to send reply");

    let fallback = delivery_failure_reply(&err);
    if let Err(err) = telegram
        .send_reply(message.chat.id, message.message_id, &fallback)
        .await
    {
        tracing::error!(chat_id = message.chat.id, error = %err, "failed to send error reply");
    }
}

fn delivery_failure_reply(err: &TelegramError) -> Reply {
    Reply::quoted(format!("Error: the reply could not be delivered: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_failure_is_reported_as_plain_text() {
        let reply = delivery_failure_reply(&TelegramError::Api(
            "Bad Request: message is too long".to_string(),
        ));
        assert_eq!(reply.parse_mode, None);
        assert!(reply.quote);
        assert_eq!(
            reply.text,
            "Error: the reply could not be delivered: Telegram API error: Bad Request: message is too long"
        );
    }
}
