//! Presigned download references for stored content.
//!
//! The store is only ever read: a reference is minted for an existing key
//! and handed to the messaging platform, which fetches the object itself.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::config::StorageConfig;

/// Placeholder users type instead of `.` (Telegram deep links cannot carry dots)
const SEPARATOR_PLACEHOLDER: &str = "dot";

/// Error code S3 reports for malformed or rejected presign parameters
const AUTHORIZATION_ERROR_CODE: &str = "AuthorizationQueryParametersError";

/// Storage key derived from a user-supplied token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentIdentifier(String);

impl ContentIdentifier {
    /// Rewrite the placeholder into `.`; `None` if nothing is left.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let key = raw.replace(SEPARATOR_PLACEHOLDER, ".");
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("no storage credentials available")]
    MissingCredentials,

    #[error("storage authorization failed: {0}")]
    Unauthorized(String),

    #[error("storage rejected request ({code}): {message}")]
    NotFound { code: String, message: String },

    #[error("storage failure: {0}")]
    Other(String),
}

impl StorageError {
    /// Classify a storage-side error by its service error code
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        if code == AUTHORIZATION_ERROR_CODE {
            StorageError::Unauthorized(message.into())
        } else {
            StorageError::NotFound {
                code: code.to_string(),
                message: message.into(),
            }
        }
    }

    /// The chat message shown to the user for this failure
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::MissingCredentials => {
                "No Credentials Found. Please report this message to the admin."
            }
            StorageError::Unauthorized(_) => "Authorization error. Please try again later.",
            StorageError::NotFound { .. } => "Nothing found!! Try again.",
            StorageError::Other(_) => {
                "We can't process your request right now. Please try again later"
            }
        }
    }
}

/// Object storage capability that mints time-limited GET references
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StorageError>;
}

/// Resolve a content identifier to a download reference valid for `validity`.
pub async fn resolve_download_reference(
    store: &dyn ObjectStore,
    content_id: &ContentIdentifier,
    validity: Duration,
) -> Result<String, StorageError> {
    info!("Resolving download reference for {}", content_id);
    match store.presign_get(content_id.as_str(), validity).await {
        Ok(url) => {
            info!(
                "Download reference for {} valid for {}s",
                content_id,
                validity.as_secs()
            );
            Ok(url)
        }
        Err(e) => {
            error!("Failed to resolve {}: {}", content_id, e);
            Err(e)
        }
    }
}

/// S3 (or S3-compatible) bucket
pub struct S3Store {
    client: Client,
    bucket: String,
    credentials: Option<SharedCredentialsProvider>,
    /// Set once the provider chain has produced credentials; failures are retried
    credentials_resolved: OnceCell<()>,
}

impl S3Store {
    /// Build a store using the default AWS credential provider chain.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;
        let region = sdk_config
            .region()
            .cloned()
            .unwrap_or_else(|| Region::new("us-east-1"));

        Self::new(config, region, sdk_config.credentials_provider())
    }

    pub fn new(
        config: &StorageConfig,
        region: Region,
        credentials: Option<SharedCredentialsProvider>,
    ) -> Self {
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(region);

        if let Some(provider) = &credentials {
            builder = builder.credentials_provider(provider.clone());
        }

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        info!(
            "S3 store initialized (bucket: {}, endpoint: {:?})",
            config.bucket, config.endpoint
        );

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            credentials,
            credentials_resolved: OnceCell::new(),
        }
    }

    /// Fail fast when no credentials can be found. Later refreshes are left
    /// to the client's own identity cache.
    async fn ensure_credentials(&self) -> Result<(), StorageError> {
        let Some(provider) = &self.credentials else {
            return Err(StorageError::MissingCredentials);
        };
        self.credentials_resolved
            .get_or_try_init(|| async {
                match provider.provide_credentials().await {
                    Ok(_) => {
                        debug!("Storage credentials resolved");
                        Ok(())
                    }
                    Err(CredentialsError::CredentialsNotLoaded(_)) => {
                        Err(StorageError::MissingCredentials)
                    }
                    Err(e) => Err(StorageError::Other(DisplayErrorContext(e).to_string())),
                }
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StorageError> {
        self.ensure_credentials().await?;

        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| match e.code() {
                Some(code) => StorageError::from_code(code, e.message().unwrap_or_default()),
                None => StorageError::Other(DisplayErrorContext(e).to_string()),
            })?;

        Ok(presigned.uri().to_string())
    }
}
