pub mod telegram;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use teloxide::types::{ChatMemberStatus, Message};
use thiserror::Error;

use crate::storage::ContentIdentifier;

pub const START_COMMAND: &str = "/start";

/// A message received through the webhook, reduced to what the flow needs
#[derive(Debug, Clone, PartialEq)]
pub struct InboundUpdate {
    pub chat_id: i64,
    pub user_id: i64,
    pub text: Option<String>,
    /// Whitespace-separated tokens of `text`
    pub arguments: Vec<String>,
}

/// What an inbound message asks the bot to do
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    ContentRequest(ContentIdentifier),
    Other,
}

impl InboundUpdate {
    pub fn classify(&self) -> Command {
        if self.text.as_deref() == Some(START_COMMAND) {
            return Command::Start;
        }
        if self.arguments.len() > 1 {
            if let Some(id) = ContentIdentifier::from_raw(&self.arguments[1]) {
                return Command::ContentRequest(id);
            }
        }
        Command::Other
    }
}

#[derive(Debug, Error)]
pub enum UpdateParseError {
    #[error("update body is not valid JSON: {0}")]
    Malformed(serde_json::Error),
    #[error("update message has an unexpected shape: {0}")]
    Shape(serde_json::Error),
}

/// Parse a webhook body into an update.
///
/// Returns `Ok(None)` for updates that carry no message, chat or sender
/// (channel posts, edits, callback queries); those are not for us.
pub fn parse_update(body: &str) -> Result<Option<InboundUpdate>, UpdateParseError> {
    let update: Value = serde_json::from_str(body).map_err(UpdateParseError::Malformed)?;

    let Some(message) = present(update.get("message")) else {
        return Ok(None);
    };
    if present(message.get("chat")).is_none() || present(message.get("from")).is_none() {
        return Ok(None);
    }

    let msg = Message::deserialize(message).map_err(UpdateParseError::Shape)?;
    let Some(user) = msg.from.as_ref() else {
        return Ok(None);
    };

    let text = msg.text().map(str::to_string);
    let arguments = text
        .as_deref()
        .map(|t| t.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    Ok(Some(InboundUpdate {
        chat_id: msg.chat.id.0,
        user_id: user.id.0 as i64,
        text,
        arguments,
    }))
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

// ── Outbound gateway ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout)
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatInfo {
    pub invite_link: Option<String>,
}

/// Statuses that do not grant access to gated content
pub fn denies_access(status: &ChatMemberStatus) -> bool {
    matches!(
        status,
        ChatMemberStatus::Restricted | ChatMemberStatus::Left | ChatMemberStatus::Banned
    )
}

/// Outbound calls to the messaging platform.
///
/// Each method performs a single attempt. Callers treat any error as the
/// capability being unavailable.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> GatewayResult<SentMessage>;

    async fn send_video(&self, chat_id: i64, video_url: &str) -> GatewayResult<SentMessage>;

    async fn get_chat(&self, chat_id: i64) -> GatewayResult<ChatInfo>;

    async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> GatewayResult<ChatMemberStatus>;
}
