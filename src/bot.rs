use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::access::{self, MembershipDecision};
use crate::config::Config;
use crate::platform::{self, Command, MessagingGateway, UpdateParseError};
use crate::server::{ResponseEnvelope, WebhookEvent};
use crate::storage::{self, ContentIdentifier, ObjectStore, StorageError};

const WELCOME_TEXT: &str = "Welcome to the bot! Please enter a number after /start";
const PROCESSING_TEXT: &str = "Hold on, processing your request.";
const VIDEO_MISSING_TEXT: &str = "Video not found or video removed. Please try again later.";
const TIMEOUT_TEXT: &str = "The request timed out. Please try again later.";

/// Shared application state, built once at startup
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<dyn MessagingGateway>,
    pub store: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        gateway: Arc<dyn MessagingGateway>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            gateway,
            store,
        }
    }
}

/// How a content delivery attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    NotFound,
    Unauthorized,
    TransientFailure,
    InternalError,
}

impl From<&StorageError> for DeliveryOutcome {
    fn from(err: &StorageError) -> Self {
        match err {
            StorageError::MissingCredentials | StorageError::Other(_) => {
                DeliveryOutcome::InternalError
            }
            StorageError::Unauthorized(_) => DeliveryOutcome::Unauthorized,
            StorageError::NotFound { .. } => DeliveryOutcome::NotFound,
        }
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::NotFound => "not found",
            DeliveryOutcome::Unauthorized => "unauthorized",
            DeliveryOutcome::TransientFailure => "transient failure",
            DeliveryOutcome::InternalError => "internal error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
enum DispatchError {
    /// Absent or unreadable body; answered with an error payload only
    #[error("{0}")]
    Structural(String),

    /// Anything unexpected; also reported to the admin chat
    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),
}

impl From<UpdateParseError> for DispatchError {
    fn from(err: UpdateParseError) -> Self {
        match err {
            UpdateParseError::Malformed(_) => DispatchError::Structural(err.to_string()),
            UpdateParseError::Shape(_) => DispatchError::Unclassified(err.into()),
        }
    }
}

/// Handle one webhook invocation.
///
/// Every outcome of the webhook path is a 200: failures are reported to the
/// user (or the admin chat) as chat messages, not as transport errors.
pub async fn handle_event(state: &AppState, event: &WebhookEvent) -> ResponseEnvelope {
    match dispatch(state, event).await {
        Ok(()) => ResponseEnvelope::ok(),
        Err(DispatchError::Structural(message)) => {
            error!("Rejected update: {}", message);
            ResponseEnvelope::error(&message)
        }
        Err(DispatchError::Unclassified(e)) => {
            let message = format!("{:#}", e);
            error!("Error handling update: {}", message);
            report_to_admin(state, &message).await;
            ResponseEnvelope::error(&message)
        }
    }
}

async fn dispatch(state: &AppState, event: &WebhookEvent) -> Result<(), DispatchError> {
    let body = event
        .body
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| DispatchError::Structural("update body is absent".to_string()))?;

    let Some(update) = platform::parse_update(body)? else {
        warn!("Ignoring update without a message");
        return Ok(());
    };

    info!(
        "Update from user {} in chat {}: {:?}",
        update.user_id, update.chat_id, update.text
    );

    match update.classify() {
        Command::Start => {
            state
                .gateway
                .send_text(update.chat_id, WELCOME_TEXT)
                .await
                .ok();
        }
        Command::ContentRequest(content_id) => {
            match access::check_membership(state, update.user_id, update.chat_id).await {
                MembershipDecision::Allowed => {}
                MembershipDecision::Denied => {
                    info!("Content {} withheld from user {}", content_id, update.user_id);
                    return Ok(());
                }
                MembershipDecision::Unknown(e) => {
                    warn!("Membership of user {} unknown ({}), failing closed", update.user_id, e);
                    return Ok(());
                }
            }
            let outcome = deliver_content(state, update.chat_id, &content_id).await;
            info!("Delivery of {} to {}: {}", content_id, update.chat_id, outcome);
        }
        Command::Other => {}
    }

    Ok(())
}

/// Acknowledge, mint a download reference and send it as a video.
///
/// Each failure sends exactly one explanatory message to the chat.
pub async fn deliver_content(
    state: &AppState,
    chat_id: i64,
    content_id: &ContentIdentifier,
) -> DeliveryOutcome {
    state.gateway.send_text(chat_id, PROCESSING_TEXT).await.ok();

    let url = match storage::resolve_download_reference(
        state.store.as_ref(),
        content_id,
        state.config.presign_expiry(),
    )
    .await
    {
        Ok(url) => url,
        Err(e) => {
            state.gateway.send_text(chat_id, e.user_message()).await.ok();
            return DeliveryOutcome::from(&e);
        }
    };

    match state.gateway.send_video(chat_id, &url).await {
        Ok(sent) => {
            info!("Video {} sent to {} as message {}", content_id, chat_id, sent.message_id);
            DeliveryOutcome::Delivered
        }
        Err(e) if e.is_timeout() => {
            error!("Timed out sending video to {}", chat_id);
            state.gateway.send_text(chat_id, TIMEOUT_TEXT).await.ok();
            DeliveryOutcome::TransientFailure
        }
        Err(e) => {
            warn!("Video for {} not delivered: {}", content_id, e);
            state
                .gateway
                .send_text(chat_id, VIDEO_MISSING_TEXT)
                .await
                .ok();
            DeliveryOutcome::NotFound
        }
    }
}

async fn report_to_admin(state: &AppState, message: &str) {
    let admin_chat = state.config.telegram.error_chat_id;
    if let Err(e) = state
        .gateway
        .send_text(admin_chat, &format!("Error: {}", message))
        .await
    {
        error!("Failed to report error to admin chat {}: {}", admin_chat, e);
    }
}
