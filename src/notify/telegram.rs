// Telegram Bot API transport.
//
// Messages go out through `sendMessage`. HTML parse failures come back as
// HTTP 400 with a "can't parse entities" description; those are reported as
// `Rejected` so the dispatcher can retry in plain text. Everything else is a
// plain delivery failure.
//
// API docs: https://core.telegram.org/bots/api

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{NotificationTransport, OutboundMessage, RichFormat, TransportError};

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TelegramTransport {
    client: Client,
    api_url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Identity of the bot behind a token, from `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

/// A chat that recently messaged the bot, from `getUpdates`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    pub id: i64,
    pub kind: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct Update {
    message: Option<UpdateMessage>,
    channel_post: Option<UpdateMessage>,
}

#[derive(Debug, Deserialize)]
struct UpdateMessage {
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
    title: Option<String>,
    username: Option<String>,
    first_name: Option<String>,
}

impl TelegramTransport {
    /// A transport with no token is valid but refuses every send.
    pub fn new(api_url: &str, token: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()).map(String::from),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    fn method_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{token}/{method}", self.api_url)
    }

    fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .context("TELEGRAM_BOT_TOKEN is not set")
    }

    /// Check the token by asking who the bot is.
    pub async fn verify(&self) -> Result<BotIdentity> {
        let token = self.require_token()?;
        let resp: ApiResponse<BotIdentity> = self
            .client
            .get(self.method_url(token, "getMe"))
            .send()
            .await
            .context("getMe request failed")?
            .json()
            .await
            .context("Failed to parse getMe response")?;
        unwrap_result(resp, "getMe")
    }

    /// Chats that messaged the bot recently, deduplicated in first-seen order.
    pub async fn recent_chats(&self) -> Result<Vec<ChatSummary>> {
        let token = self.require_token()?;
        let resp: ApiResponse<Vec<Update>> = self
            .client
            .get(self.method_url(token, "getUpdates"))
            .send()
            .await
            .context("getUpdates request failed")?
            .json()
            .await
            .context("Failed to parse getUpdates response")?;
        let updates = unwrap_result(resp, "getUpdates")?;
        Ok(summarize_chats(updates))
    }
}

#[async_trait]
impl NotificationTransport for TelegramTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let Some(token) = self.token.as_deref() else {
            return Err(TransportError::NotConfigured);
        };
        if message.recipient.is_empty() {
            return Err(TransportError::NotConfigured);
        }

        let body = SendMessage {
            chat_id: &message.recipient,
            text: &message.text,
            parse_mode: message.rich_format.map(|f| match f {
                RichFormat::Html => "HTML",
            }),
            disable_web_page_preview: false,
        };

        let resp = self
            .client
            .post(self.method_url(token, "sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Failed(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            debug!(chat = %message.recipient, "Telegram accepted message");
            return Ok(());
        }

        let description = resp
            .json::<ApiResponse<serde_json::Value>>()
            .await
            .ok()
            .and_then(|r| r.description)
            .unwrap_or_default();
        Err(classify_failure(
            status,
            &description,
            message.rich_format.is_some(),
        ))
    }
}

/// Map a non-success reply to a transport error. Only a 400 on a rich
/// message counts as a format rejection.
pub fn classify_failure(status: StatusCode, description: &str, rich: bool) -> TransportError {
    let detail = if description.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {description}", status.as_u16())
    };
    if rich && status == StatusCode::BAD_REQUEST {
        TransportError::Rejected(detail)
    } else {
        TransportError::Failed(detail)
    }
}

fn unwrap_result<T>(resp: ApiResponse<T>, method: &str) -> Result<T> {
    match (resp.ok, resp.result) {
        (true, Some(result)) => Ok(result),
        _ => anyhow::bail!(
            "{method} failed: {}",
            resp.description.unwrap_or_else(|| "no description".into())
        ),
    }
}

fn summarize_chats(updates: Vec<Update>) -> Vec<ChatSummary> {
    let mut chats: Vec<ChatSummary> = Vec::new();
    for update in updates {
        let Some(msg) = update.message.or(update.channel_post) else {
            continue;
        };
        if chats.iter().any(|c| c.id == msg.chat.id) {
            continue;
        }
        let title = msg
            .chat
            .title
            .or(msg.chat.username)
            .or(msg.chat.first_name)
            .unwrap_or_default();
        chats.push(ChatSummary {
            id: msg.chat.id,
            kind: msg.chat.kind,
            title,
        });
    }
    chats
}
