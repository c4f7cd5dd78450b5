use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Administrative chat that receives unexpected errors
    #[serde(default)]
    pub error_chat_id: i64,
    /// Channel a user must belong to before content is delivered
    #[serde(default)]
    pub required_channel_id: i64,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub bucket: String,
    /// Falls back to AWS_REGION, then us-east-1
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible backends (MinIO, R2, B2)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_presign_expiry_secs")]
    pub presign_expiry_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
    /// Expected value of the X-Telegram-Bot-Api-Secret-Token header
    #[serde(default)]
    pub secret_token: Option<String>,
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_presign_expiry_secs() -> u64 {
    3600
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_url: default_api_url(),
            error_chat_id: 0,
            required_channel_id: 0,
            request_timeout_secs: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: None,
            endpoint: None,
            presign_expiry_secs: default_presign_expiry_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            webhook_path: default_webhook_path(),
            secret_token: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Deployment environment variables take precedence over the file.
    ///
    /// Missing values are left as-is; a half-configured deployment degrades
    /// at request time rather than refusing to start.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_BOT_API") {
            self.telegram.bot_token = token;
        }
        if let Some(bucket) = lookup("BUCKET_NAME") {
            self.storage.bucket = bucket;
        }
        if let Some(raw) = lookup("TELEGRAM_ERROR_GROUP") {
            self.telegram.error_chat_id = raw
                .trim()
                .parse()
                .with_context(|| format!("TELEGRAM_ERROR_GROUP is not a chat id: {}", raw))?;
        }
        if let Some(raw) = lookup("TELEGRAM_CHANNEL_REQ") {
            self.telegram.required_channel_id = raw
                .trim()
                .parse()
                .with_context(|| format!("TELEGRAM_CHANNEL_REQ is not a chat id: {}", raw))?;
        }
        Ok(())
    }

    /// Reject values the HTTP router cannot mount
    pub fn validate(&self) -> Result<()> {
        let path = &self.server.webhook_path;
        if !path.starts_with('/') {
            bail!("server.webhook_path must start with '/': {:?}", path);
        }
        if path.contains(['{', '}', '*']) {
            bail!("server.webhook_path must be a literal path: {:?}", path);
        }
        Ok(())
    }

    pub fn presign_expiry(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.storage.presign_expiry_secs)
    }
}
