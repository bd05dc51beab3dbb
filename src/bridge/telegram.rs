//! Telegram Bot API client.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::TelegramConfig;
use crate::error::RelayError;

use super::ChatPlatform;

#[derive(Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Value>,
    #[serde(default)]
    description: Option<String>,
}

/// Long-polling Bot API client.
pub struct TelegramClient {
    client: reqwest::Client,
    // Contains the bot token; never log it.
    bot_url: String,
    long_poll_timeout: u64,
    offset: Mutex<Option<i64>>,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.long_poll_timeout_seconds + 10))
            .build()?;

        Ok(Self {
            client,
            bot_url: format!(
                "{}/bot{}",
                config.api_base.trim_end_matches('/'),
                config.token
            ),
            long_poll_timeout: config.long_poll_timeout_seconds,
            offset: Mutex::new(None),
        })
    }

    fn current_offset(&self) -> Option<i64> {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn advance_offset(&self, update_id: i64) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        if offset.map_or(true, |current| update_id + 1 > current) {
            *offset = Some(update_id + 1);
        }
    }
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient")
            .field("offset", &self.current_offset())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatPlatform for TelegramClient {
    async fn fetch_messages(&self) -> Result<Vec<Value>, RelayError> {
        let mut query = vec![("timeout", self.long_poll_timeout.to_string())];
        if let Some(offset) = self.current_offset() {
            query.push(("offset", offset.to_string()));
        }

        let response: UpdatesResponse = self
            .client
            .get(format!("{}/getUpdates", self.bot_url))
            .query(&query)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(RelayError::Transport {
                message: format!(
                    "getUpdates failed: {}",
                    response.description.unwrap_or_default()
                ),
            });
        }

        let mut messages = Vec::new();
        for update in &response.result {
            if let Some(update_id) = update.get("update_id").and_then(Value::as_i64) {
                self.advance_offset(update_id);
            }
            if let Some(message) = flatten_update(update) {
                messages.push(message);
            }
        }
        debug!(
            updates = response.result.len(),
            messages = messages.len(),
            "Polled Telegram"
        );

        Ok(messages)
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), RelayError> {
        let response = self
            .client
            .get(format!("{}/sendMessage", self.bot_url))
            .query(&[("chat_id", chat_id.to_string()), ("text", text.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Upstream {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Flatten a Telegram update into the message forwarded to the gateway.
///
/// Updates without a non-empty text message are skipped.
pub fn flatten_update(update: &Value) -> Option<Value> {
    let message = update.get("message")?;
    let text = message.get("text")?.as_str().filter(|t| !t.is_empty())?;
    let from = message.get("from");
    let chat = message.get("chat");

    Some(json!({
        "text": text,
        "telegram_user_id": field(from, "id"),
        "is_bot": field(from, "is_bot"),
        "first_name": field(from, "first_name"),
        "last_name": field(from, "last_name"),
        "username": field(from, "username"),
        "chat_id": field(chat, "id"),
        "chat_type": field(chat, "type"),
        "date": field(Some(message), "date"),
    }))
}

fn field(parent: Option<&Value>, key: &str) -> Value {
    parent
        .and_then(|p| p.get(key))
        .cloned()
        .unwrap_or(Value::Null)
}
