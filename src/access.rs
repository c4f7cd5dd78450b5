use tracing::{info, warn};

use crate::bot::AppState;
use crate::platform::{self, GatewayError};

pub const MEMBERSHIP_CHECK_FAILED_TEXT: &str = "Something went wrong. Please try again later.";

/// Result of checking a user against the required channel
#[derive(Debug)]
pub enum MembershipDecision {
    Allowed,
    Denied,
    /// The membership query itself failed; treated as denied
    Unknown(GatewayError),
}

/// Text sent to a user who has not joined the required channel.
/// The invite segment is dropped when no link could be resolved.
pub fn remediation_message(invite_link: Option<&str>) -> String {
    match invite_link {
        Some(link) => format!(
            "Please join the channel (click to join: {}) to access the content.",
            link
        ),
        None => "Please join the channel to access the content.".to_string(),
    }
}

/// Check that `user_id` belongs to the configured channel.
///
/// Membership is re-queried on every call. On denial the user is sent the
/// channel's invite link; if the query fails the chat gets a generic notice.
pub async fn check_membership(state: &AppState, user_id: i64, chat_id: i64) -> MembershipDecision {
    let channel_id = state.config.telegram.required_channel_id;

    let status = match state.gateway.get_chat_member(channel_id, user_id).await {
        Ok(status) => status,
        Err(e) => {
            warn!("Membership check for user {} failed: {}", user_id, e);
            state
                .gateway
                .send_text(chat_id, MEMBERSHIP_CHECK_FAILED_TEXT)
                .await
                .ok();
            return MembershipDecision::Unknown(e);
        }
    };

    if !platform::denies_access(&status) {
        return MembershipDecision::Allowed;
    }

    info!(
        "User {} is not a member of {} ({:?})",
        user_id, channel_id, status
    );

    let invite_link = match state.gateway.get_chat(channel_id).await {
        Ok(chat) => chat.invite_link,
        Err(e) => {
            warn!("Could not resolve invite link for {}: {}", channel_id, e);
            None
        }
    };

    state
        .gateway
        .send_text(user_id, &remediation_message(invite_link.as_deref()))
        .await
        .ok();

    MembershipDecision::Denied
}
