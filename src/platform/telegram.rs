use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ChatMemberStatus, InputFile, Message, UserId};
use teloxide::RequestError;
use tracing::{debug, error};

use super::{ChatInfo, GatewayError, GatewayResult, MessagingGateway, SentMessage};
use crate::config::TelegramConfig;

/// Messaging gateway backed by the Telegram Bot API
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let mut builder = teloxide::net::default_reqwest_settings();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .context("Failed to build Telegram HTTP client")?;

        // Method paths are joined onto the base, so it must end in a slash.
        let api_url = format!("{}/", config.api_url.trim_end_matches('/'));
        let api_url = reqwest::Url::parse(&api_url)
            .with_context(|| format!("Invalid Telegram API URL: {}", config.api_url))?;

        let bot = Bot::with_client(config.bot_token.clone(), client).set_api_url(api_url);
        Ok(Self { bot })
    }
}

fn classify_request_error(e: &RequestError) -> GatewayError {
    match e {
        RequestError::Network(err) if err.is_timeout() => GatewayError::Timeout,
        RequestError::Network(err) => GatewayError::Transport(err.to_string()),
        RequestError::Api(api) => GatewayError::Api(api.to_string()),
        RequestError::InvalidJson { .. } => GatewayError::Decode(e.to_string()),
        other => GatewayError::Transport(other.to_string()),
    }
}

fn request_failed(method: &str, e: RequestError) -> GatewayError {
    let err = classify_request_error(&e);
    error!("Telegram {} failed: {}", method, e);
    err
}

fn sent(method: &str, msg: &Message) -> SentMessage {
    debug!("Telegram {} succeeded (message {})", method, msg.id.0);
    SentMessage {
        message_id: i64::from(msg.id.0),
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send_text(&self, chat_id: i64, text: &str) -> GatewayResult<SentMessage> {
        let msg = self
            .bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| request_failed("sendMessage", e))?;
        Ok(sent("sendMessage", &msg))
    }

    async fn send_video(&self, chat_id: i64, video_url: &str) -> GatewayResult<SentMessage> {
        let url: reqwest::Url = video_url
            .parse()
            .map_err(|e| GatewayError::Transport(format!("invalid video URL: {}", e)))?;

        let msg = self
            .bot
            .send_video(ChatId(chat_id), InputFile::url(url))
            .await
            .map_err(|e| request_failed("sendVideo", e))?;
        Ok(sent("sendVideo", &msg))
    }

    async fn get_chat(&self, chat_id: i64) -> GatewayResult<ChatInfo> {
        let chat = self
            .bot
            .get_chat(ChatId(chat_id))
            .await
            .map_err(|e| request_failed("getChat", e))?;
        debug!("Telegram getChat succeeded for {}", chat.id.0);
        Ok(ChatInfo {
            invite_link: chat.invite_link().map(str::to_string),
        })
    }

    async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> GatewayResult<ChatMemberStatus> {
        let member = self
            .bot
            .get_chat_member(ChatId(chat_id), UserId(user_id as u64))
            .await
            .map_err(|e| request_failed("getChatMember", e))?;
        debug!("Telegram getChatMember succeeded for {} in {}", user_id, chat_id);
        Ok(member.kind.status())
    }
}
