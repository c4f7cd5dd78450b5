//! HTTP entry point: turns webhook requests into [`WebhookEvent`]s and
//! [`ResponseEnvelope`]s back into HTTP responses.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::bot::{self, AppState};

const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// A normalized webhook invocation
#[derive(Debug, Clone, Default)]
pub struct WebhookEvent {
    pub body: Option<String>,
}

impl WebhookEvent {
    pub fn new(body: Option<String>) -> Self {
        Self { body }
    }

    /// An empty request body counts as absent.
    pub fn from_bytes(body: &[u8]) -> Self {
        if body.is_empty() {
            Self::new(None)
        } else {
            Self::new(Some(String::from_utf8_lossy(body).into_owned()))
        }
    }
}

/// What the invoking layer gets back
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub body: String,
}

impl ResponseEnvelope {
    pub fn ok() -> Self {
        Self {
            status_code: 200,
            body: "OK".to_string(),
        }
    }

    /// A 200 carrying `{"error": message}`
    pub fn error(message: &str) -> Self {
        Self {
            status_code: 200,
            body: json!({ "error": message }).to_string(),
        }
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, self.body).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let webhook_path = state.config.server.webhook_path.clone();
    Router::new()
        .route("/", get(hello))
        .route(&webhook_path, post(webhook))
        .with_state(state)
}

/// Bind the configured address and serve until the process exits
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = state.config.server.listen.clone();
    let path = state.config.server.webhook_path.clone();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Webhook server listening on {} (path: {})", addr, path);

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}

async fn hello() -> ResponseEnvelope {
    info!("Hello function called");
    ResponseEnvelope {
        status_code: 200,
        body: json!({ "message": "Hello from root!" }).to_string(),
    }
}

async fn webhook(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(expected) = &state.config.server.secret_token {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            warn!("Rejected webhook call with missing or wrong secret token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let event = WebhookEvent::from_bytes(&body);
    bot::handle_event(&state, &event).await.into_response()
}
