//! Minimal Telegram Bot API client.
//!
//! Every method is a JSON `POST` to `{base}/bot{token}/{method}`. Responses
//! follow `{ "ok": true, "result": ... }` on success and
//! `{ "ok": false, "error_code": 400, "description": "..." }` on failure.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

/// Telegram Bot API base URL.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// Transport failure before a response was read.
    #[error("{method}: request failed: {source}")]
    Http {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Telegram answered with `ok: false`.
    #[error("{method}: Telegram API error (code {code}): {description}")]
    Api {
        method: &'static str,
        code: i64,
        description: String,
    },

    /// The body was not the expected JSON.
    #[error("{method}: unexpected response: {reason}")]
    Decode { method: &'static str, reason: String },
}

impl TelegramError {
    /// The API `description`, if Telegram rejected the call.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Api { description, .. } => Some(description),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TelegramError>;

// ---------------------------------------------------------------------------
// Chat id
// ---------------------------------------------------------------------------

/// A numeric chat id or an `@username` for public channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatId {
    Id(i64),
    Username(String),
}

impl ChatId {
    /// Parse `-100123`, `@name`, `name` or `https://t.me/name`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Username(format!("@{}", normalize_username(raw))),
        }
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Username(name) => f.write_str(name),
        }
    }
}

/// Strip `https://t.me/`, `t.me/` and `@` from a channel reference.
pub fn normalize_username(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix("https://t.me/")
        .or_else(|| raw.strip_prefix("http://t.me/"))
        .or_else(|| raw.strip_prefix("t.me/"))
        .unwrap_or(raw);
    raw.trim_start_matches('@').trim_end_matches('/').to_string()
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Outgoing text formatting.
pub const PARSE_MODE_HTML: &str = "HTML";

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(TELEGRAM_API_BASE, token)
    }

    /// Point the client at another server, e.g. a local stub.
    pub fn with_base_url(base: &str, token: &str) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("companion/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            http,
            api: format!("{}/bot{token}", base.trim_end_matches('/')),
        }
    }

    /// POST one method and unwrap `result`.
    async fn call(&self, method: &'static str, body: Value) -> Result<Value> {
        self.call_with_timeout(method, body, None).await
    }

    async fn call_with_timeout(
        &self,
        method: &'static str,
        body: Value,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let mut request = self.http.post(format!("{}/{method}", self.api)).json(&body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|source| TelegramError::Http { method, source })?;

        let payload: Value = response.json().await.map_err(|e| TelegramError::Decode {
            method,
            reason: e.to_string(),
        })?;

        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            let code = payload.get("error_code").and_then(Value::as_i64).unwrap_or(-1);
            let description = payload
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            debug!(method, code, %description, "telegram call rejected");
            return Err(TelegramError::Api {
                method,
                code,
                description,
            });
        }

        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }

    // -----------------------------------------------------------------------
    // Bot
    // -----------------------------------------------------------------------

    /// The bot's own `User` object.
    pub async fn get_me(&self) -> Result<Value> {
        self.call("getMe", json!({})).await
    }

    /// Long-poll for updates starting at `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Value>> {
        let result = self
            .call_with_timeout(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": timeout_secs,
                    "allowed_updates": ["message", "callback_query"],
                }),
                Some(Duration::from_secs(timeout_secs + 10)),
            )
            .await?;

        match result {
            Value::Array(updates) => Ok(updates),
            other => Err(TelegramError::Decode {
                method: "getUpdates",
                reason: format!("expected an array, got {other}"),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// Send HTML text, returning the new message id.
    pub async fn send_message(
        &self,
        chat_id: impl Into<ChatId>,
        text: &str,
        reply_markup: Option<Value>,
    ) -> Result<i64> {
        let mut body = json!({
            "chat_id": chat_id.into(),
            "text": text,
            "parse_mode": PARSE_MODE_HTML,
            "disable_web_page_preview": true,
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup;
        }
        let result = self.call("sendMessage", body).await?;
        message_id(&result, "sendMessage")
    }

    /// Send text without any parse mode, for content that is not ours to format.
    pub async fn send_plain(&self, chat_id: impl Into<ChatId>, text: &str) -> Result<i64> {
        let result = self
            .call(
                "sendMessage",
                json!({ "chat_id": chat_id.into(), "text": text }),
            )
            .await?;
        message_id(&result, "sendMessage")
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<Value>,
    ) -> Result<()> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": PARSE_MODE_HTML,
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup;
        }
        self.call("editMessageText", body).await.map(drop)
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        self.call(
            "deleteMessage",
            json!({ "chat_id": chat_id, "message_id": message_id }),
        )
        .await
        .map(drop)
    }

    /// Copy any message (text, media, ...) into another chat.
    pub async fn copy_message(
        &self,
        chat_id: i64,
        from_chat_id: i64,
        message_id: i64,
    ) -> Result<()> {
        self.call(
            "copyMessage",
            json!({
                "chat_id": chat_id,
                "from_chat_id": from_chat_id,
                "message_id": message_id,
            }),
        )
        .await
        .map(drop)
    }

    // -----------------------------------------------------------------------
    // Interaction
    // -----------------------------------------------------------------------

    /// Dismiss the loading spinner on an inline button, optionally with a toast.
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        let mut body = json!({ "callback_query_id": callback_query_id, "show_alert": show_alert });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        self.call("answerCallbackQuery", body).await.map(drop)
    }

    pub async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<()> {
        self.call(
            "sendChatAction",
            json!({ "chat_id": chat_id, "action": action }),
        )
        .await
        .map(drop)
    }

    pub async fn set_message_reaction(
        &self,
        chat_id: i64,
        message_id: i64,
        emoji: &str,
    ) -> Result<()> {
        self.call(
            "setMessageReaction",
            json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "reaction": [{ "type": "emoji", "emoji": emoji }],
            }),
        )
        .await
        .map(drop)
    }

    // -----------------------------------------------------------------------
    // Chats
    // -----------------------------------------------------------------------

    /// A user's membership status in a chat (`member`, `left`, `kicked`, ...).
    pub async fn get_chat_member(&self, chat_id: ChatId, user_id: i64) -> Result<String> {
        let result = self
            .call(
                "getChatMember",
                json!({ "chat_id": chat_id, "user_id": user_id }),
            )
            .await?;
        result
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TelegramError::Decode {
                method: "getChatMember",
                reason: "missing status".into(),
            })
    }

    pub async fn get_chat(&self, chat_id: ChatId) -> Result<Value> {
        self.call("getChat", json!({ "chat_id": chat_id })).await
    }
}

fn message_id(result: &Value, method: &'static str) -> Result<i64> {
    result
        .get("message_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| TelegramError::Decode {
            method,
            reason: "missing message_id".into(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
