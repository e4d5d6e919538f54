//! Telegram Bot API long-polling transport.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::dispatch::Reply;

/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Telegram request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("Telegram API error: {0}")]
    Api(String),
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_parameters: Option<ReplyParameters>,
}

#[derive(Debug, Serialize)]
struct ReplyParameters {
    message_id: i64,
    allow_sending_without_reply: bool,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(client: reqwest::Client, api_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
        }
    }

    /// Long-polls for new messages starting at `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
        let body = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        let request = self
            .client
            .post(format!("{}/getUpdates", self.base_url))
            .timeout(Duration::from_secs(timeout_secs + 10))
            .json(&body);
        self.call(request).await
    }

    /// Sends a reply, splitting text that exceeds the message limit.
    ///
    /// Formatted replies are only cut between blank-line separated blocks so
    /// no markup entity straddles two messages.
    pub async fn send_reply(&self, chat_id: i64, message_id: i64, reply: &Reply) -> Result<(), TelegramError> {
        let chunks = match reply.parse_mode {
            Some(_) => split_blocks(&reply.text, MAX_MESSAGE_CHARS),
            None => split_message(&reply.text, MAX_MESSAGE_CHARS),
        };

        for chunk in &chunks {
            let payload = SendMessage {
                chat_id,
                text: chunk,
                parse_mode: reply.parse_mode.map(|mode| mode.as_str()),
                reply_parameters: reply.quote.then_some(ReplyParameters {
                    message_id,
                    allow_sending_without_reply: true,
                }),
            };
            let request = self
                .client
                .post(format!("{}/sendMessage", self.base_url))
                .json(&payload);
            let _: serde_json::Value = self.call(request).await?;
        }
        Ok(())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, TelegramError> {
        // The bot token is part of the URL, so it is stripped from transport errors.
        let response = request
            .send()
            .await
            .map_err(|err| TelegramError::Request(err.without_url()))?;
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|err| TelegramError::Request(err.without_url()))?;

        match (body.ok, body.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api(
                body.description
                    .unwrap_or_else(|| "request was not successful".to_string()),
            )),
        }
    }
}

/// Splits text into chunks of at most `max_chars` characters, preferring line breaks.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let hard_end = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(idx, _)| idx);
        let cut = match rest[..hard_end].rfind('\n') {
            Some(idx) if idx > 0 => idx,
            _ => hard_end,
        };
        chunks.push(rest[..cut].to_string());
        rest = rest[cut..].strip_prefix('\n').unwrap_or(&rest[cut..]);
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Groups `"\n\n"` separated blocks into chunks of at most `max_chars`
/// characters. A single block longer than the limit becomes its own chunk.
pub fn split_blocks(text: &str, max_chars: usize) -> Vec<String> {
    const SEPARATOR: &str = "\n\n";

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for block in text.split(SEPARATOR) {
        let block_chars = block.chars().count();
        if !current.is_empty() && current_chars + SEPARATOR.len() + block_chars > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push_str(SEPARATOR);
            current_chars += SEPARATOR.len();
        }
        current.push_str(block);
        current_chars += block_chars;
    }
    chunks.push(current);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::render_persona_list;
    use crate::persona::Persona;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello", 10), vec!["hello".to_string()]);
        assert_eq!(split_message("", 10), vec![String::new()]);
    }

    #[test]
    fn long_text_splits_on_newline_when_possible() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_message(text, 10), vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn long_line_splits_on_char_boundaries() {
        let text = "ééééééé";
        let chunks = split_message(text, 3);
        assert_eq!(chunks, vec!["ééé", "ééé", "é"]);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 3));
    }

    #[test]
    fn blocks_are_grouped_without_splitting_inside() {
        assert_eq!(split_blocks("aa\n\nbb\n\ncc", 6), vec!["aa\n\nbb", "cc"]);
        assert_eq!(split_blocks("short", 10), vec!["short"]);
        assert_eq!(split_blocks("", 10), vec![String::new()]);
        assert_eq!(
            split_blocks("tiny\n\nthis block is too long", 8),
            vec!["tiny", "this block is too long"]
        );
    }

    #[test]
    fn long_persona_listing_is_sent_in_several_messages() {
        let personas: Vec<Persona> = (0..20)
            .map(|idx| Persona {
                name: format!("persona{idx}"),
                description: "x".repeat(300),
            })
            .collect();
        let listing = render_persona_list(&personas);
        assert!(listing.chars().count() > MAX_MESSAGE_CHARS);

        let chunks = split_blocks(&listing, MAX_MESSAGE_CHARS);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.join("\n\n"), listing);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= MAX_MESSAGE_CHARS);
            // Every expandable quote opened in a chunk is closed in it.
            assert_eq!(chunk.matches("**>").count(), chunk.matches("\n>||").count());
        }
    }

    #[test]
    fn updates_deserialize_from_api_shape() {
        let body: ApiResponse<Vec<Update>> = serde_json::from_value(json!({
            "ok": true,
            "result": [
                {
                    "update_id": 7,
                    "message": {
                        "message_id": 42,
                        "date": 0,
                        "chat": { "id": -100, "type": "group" },
                        "from": { "id": 1, "is_bot": false, "first_name": "A" },
                        "text": "/ai hi"
                    }
                },
                { "update_id": 8, "edited_message": { "message_id": 1 } }
            ]
        }))
        .unwrap();

        let updates = body.result.unwrap();
        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, -100);
        assert_eq!(message.text.as_deref(), Some("/ai hi"));
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn quoted_markdown_reply_payload() {
        let payload = SendMessage {
            chat_id: 5,
            text: "*bold*",
            parse_mode: Some("MarkdownV2"),
            reply_parameters: Some(ReplyParameters {
                message_id: 9,
                allow_sending_without_reply: true,
            }),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "chat_id": 5,
                "text": "*bold*",
                "parse_mode": "MarkdownV2",
                "reply_parameters": { "message_id": 9, "allow_sending_without_reply": true }
            })
        );

        let plain = SendMessage {
            chat_id: 5,
            text: "hi",
            parse_mode: None,
            reply_parameters: None,
        };
        assert_eq!(
            serde_json::to_value(&plain).unwrap(),
            json!({ "chat_id": 5, "text": "hi" })
        );
    }
}
