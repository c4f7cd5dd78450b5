//! In-memory fakes for the messaging and storage capabilities.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use teloxide::types::ChatMemberStatus;

use crate::bot::AppState;
use crate::config::Config;
use crate::platform::{ChatInfo, GatewayError, GatewayResult, MessagingGateway, SentMessage};
use crate::storage::{ObjectStore, StorageError};

pub const REQUIRED_CHANNEL: i64 = -1001;
pub const ADMIN_CHAT: i64 = -2002;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SendText { chat_id: i64, text: String },
    SendVideo { chat_id: i64, url: String },
    GetChat { chat_id: i64 },
    GetChatMember { chat_id: i64, user_id: i64 },
}

struct GatewayScript {
    member_status: ChatMemberStatus,
    invite_link: Option<String>,
    fail_get_chat: bool,
    fail_get_chat_member: bool,
    video_error: Option<GatewayError>,
}

pub struct RecordingGateway {
    calls: Mutex<Vec<Call>>,
    script: Mutex<GatewayScript>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(GatewayScript {
                member_status: ChatMemberStatus::Member,
                invite_link: Some("https://t.me/+invite".to_string()),
                fail_get_chat: false,
                fail_get_chat_member: false,
                video_error: None,
            }),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<(i64, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SendText { chat_id, text } => Some((chat_id, text)),
                _ => None,
            })
            .collect()
    }

    pub fn set_member_status(&self, status: ChatMemberStatus) {
        self.script.lock().unwrap().member_status = status;
    }

    pub fn set_invite_link(&self, link: Option<&str>) {
        self.script.lock().unwrap().invite_link = link.map(str::to_string);
    }

    pub fn fail_get_chat(&self) {
        self.script.lock().unwrap().fail_get_chat = true;
    }

    pub fn fail_get_chat_member(&self) {
        self.script.lock().unwrap().fail_get_chat_member = true;
    }

    pub fn fail_video(&self, error: GatewayError) {
        self.script.lock().unwrap().video_error = Some(error);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn unavailable() -> GatewayError {
    GatewayError::Transport("connection refused".to_string())
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_text(&self, chat_id: i64, text: &str) -> GatewayResult<SentMessage> {
        self.record(Call::SendText {
            chat_id,
            text: text.to_string(),
        });
        Ok(SentMessage { message_id: 1 })
    }

    async fn send_video(&self, chat_id: i64, video_url: &str) -> GatewayResult<SentMessage> {
        self.record(Call::SendVideo {
            chat_id,
            url: video_url.to_string(),
        });
        match self.script.lock().unwrap().video_error.clone() {
            Some(e) => Err(e),
            None => Ok(SentMessage { message_id: 2 }),
        }
    }

    async fn get_chat(&self, chat_id: i64) -> GatewayResult<ChatInfo> {
        self.record(Call::GetChat { chat_id });
        let script = self.script.lock().unwrap();
        if script.fail_get_chat {
            return Err(unavailable());
        }
        Ok(ChatInfo {
            invite_link: script.invite_link.clone(),
        })
    }

    async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> GatewayResult<ChatMemberStatus> {
        self.record(Call::GetChatMember { chat_id, user_id });
        let script = self.script.lock().unwrap();
        if script.fail_get_chat_member {
            return Err(unavailable());
        }
        Ok(script.member_status.clone())
    }
}

pub struct FakeStore {
    response: Mutex<Result<String, StorageError>>,
    requests: Mutex<Vec<(String, Duration)>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            response: Mutex::new(Ok("https://storage.example/videos/object?sig=abc".to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_with(&self, error: StorageError) {
        *self.response.lock().unwrap() = Err(error);
    }

    pub fn requests(&self) -> Vec<(String, Duration)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StorageError> {
        self.requests
            .lock()
            .unwrap()
            .push((key.to_string(), expires_in));
        self.response.lock().unwrap().clone()
    }
}

pub fn test_config() -> Config {
    Config::parse(&format!(
        r#"
[telegram]
bot_token = "123:test"
error_chat_id = {ADMIN_CHAT}
required_channel_id = {REQUIRED_CHANNEL}

[storage]
bucket = "videos"
"#
    ))
    .unwrap()
}

/// App state wired to fresh fakes
pub fn harness() -> (AppState, Arc<RecordingGateway>, Arc<FakeStore>) {
    let gateway = Arc::new(RecordingGateway::new());
    let store = Arc::new(FakeStore::new());
    let state = AppState::new(test_config(), gateway.clone(), store.clone());
    (state, gateway, store)
}
