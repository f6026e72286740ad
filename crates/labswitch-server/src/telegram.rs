//! Telegram Bot API transport: long-polled `getUpdates`, `sendMessage`, and
//! `leaveChat`.
//!
//! The bot token is part of every request URL, so reqwest errors are always
//! stripped of their URL before they are logged or returned.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use labswitch_core::chat::{ChatTransport, InboundMessage, Sender};
use labswitch_core::errors::ChatError;
use labswitch_core::ids::ChatId;
use labswitch_core::security::BotToken;

/// Extra time allowed on top of the long-poll timeout before the HTTP request
/// itself is abandoned.
const POLL_SLACK: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    /// API root, e.g. `https://api.telegram.org`.
    pub api_url: String,
    pub token: BotToken,
    pub poll_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

pub struct TelegramTransport {
    client: Client,
    /// `{api_url}/bot{token}`. Never log this.
    endpoint: String,
    poll_timeout: Duration,
    /// Next update id to request; everything below it is acknowledged.
    offset: AtomicI64,
}

impl TelegramTransport {
    pub fn new(config: TelegramConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChatError::Network(format!("failed to build HTTP client: {}", e.without_url())))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.token.expose()
            ),
            poll_timeout: config.poll_timeout,
            offset: AtomicI64::new(0),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<T, ChatError> {
        let resp = self
            .client
            .post(format!("{}/{method}", self.endpoint))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.without_url().to_string()))?;

        let status = resp.status();
        let parsed: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| ChatError::InvalidResponse(e.without_url().to_string()))?;

        match parsed {
            ApiResponse { ok: true, result: Some(result), .. } => Ok(result),
            ApiResponse { ok: true, result: None, .. } => {
                Err(ChatError::InvalidResponse(format!("{method}: missing result")))
            }
            ApiResponse { error_code, description, .. } => Err(ChatError::Api {
                code: error_code.unwrap_or(status.as_u16()),
                description: description.unwrap_or_default(),
            }),
        }
    }
}

/// Text messages become inbound messages; everything else is acknowledged
/// and dropped.
fn to_inbound(update: Update) -> Option<InboundMessage> {
    let message = update.message?;
    let text = message.text?;
    let from = message.from?;
    Some(InboundMessage {
        chat_id: ChatId(message.chat.id),
        sender: Sender {
            id: from.id,
            username: from.username,
        },
        text,
    })
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn next_batch(&self) -> Result<Vec<InboundMessage>, ChatError> {
        let offset = self.offset.load(Ordering::Acquire);
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": self.poll_timeout.as_secs(),
                    "allowed_updates": ["message"],
                }),
                self.poll_timeout + POLL_SLACK,
            )
            .await?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset.store(last + 1, Ordering::Release);
        }
        debug!(count = updates.len(), "received updates");

        Ok(updates.into_iter().filter_map(to_inbound).collect())
    }

    #[instrument(skip(self, text), fields(chat_id = %chat_id))]
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), ChatError> {
        let _: serde_json::Value = self
            .call("sendMessage", json!({ "chat_id": chat_id.0, "text": text }), REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(chat_id = %chat_id))]
    async fn leave(&self, chat_id: ChatId) -> Result<(), ChatError> {
        let _: bool = self
            .call("leaveChat", json!({ "chat_id": chat_id.0 }), REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }
}
