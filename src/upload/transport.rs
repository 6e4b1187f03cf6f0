use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;

use super::authority::AuthorizationToken;
use crate::config::UploadConfig;
use crate::error::{ClipcastError, ClipcastResult};
use crate::logger::{LogLevel, LOGGER};

/// What the server says it stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDescriptor {
    pub sha256: String,
    pub url: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Unix seconds
    pub uploaded: i64,
}

/// Streams files to the media server.
///
/// Every call builds its own client and drops it afterwards, so no connection
/// is shared between uploads.
#[derive(Debug, Clone)]
pub struct UploadTransport {
    connect_timeout: Duration,
    transfer_timeout: Duration,
}

impl Default for UploadTransport {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

impl UploadTransport {
    pub fn new(connect_timeout: Duration, transfer_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            transfer_timeout,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.connect_timeout(), config.transfer_timeout())
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn transfer_timeout(&self) -> Duration {
        self.transfer_timeout
    }

    pub async fn upload(
        &self,
        file: &Path,
        token: &AuthorizationToken,
        mime_type: &str,
        endpoint: &str,
    ) -> ClipcastResult<UploadDescriptor> {
        let target = upload_url(endpoint)?;

        let handle = tokio::fs::File::open(file).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ClipcastError::FileNotFound(file.display().to_string()),
            _ => ClipcastError::Io(e),
        })?;
        let size = handle.metadata().await?.len();

        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.transfer_timeout)
            .build()?;

        LOGGER.log(
            LogLevel::Info,
            &format!("Uploading {} ({} bytes) to {}", file.display(), size, target),
            "upload::transport",
        );

        let response = client
            .put(target.clone())
            .header(CONTENT_TYPE, mime_type)
            .header(CONTENT_LENGTH, size)
            .header(AUTHORIZATION, token.as_str())
            .body(Body::wrap_stream(ReaderStream::new(handle)))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            LOGGER.log(
                LogLevel::Warn,
                &format!("Upload rejected with {}: {}", status, body.trim()),
                "upload::transport",
            );
            return Err(ClipcastError::UploadFailed {
                status: Some(status.as_u16()),
                message: if body.trim().is_empty() {
                    status.to_string()
                } else {
                    body.trim().to_string()
                },
            });
        }

        let body = response.bytes().await?;
        let descriptor: UploadDescriptor = serde_json::from_slice(&body)
            .map_err(|e| ClipcastError::InvalidServerResponse(e.to_string()))?;

        LOGGER.log(
            LogLevel::Info,
            &format!("Upload stored at {}", descriptor.url),
            "upload::transport",
        );
        Ok(descriptor)
    }
}

fn upload_url(endpoint: &str) -> ClipcastResult<url::Url> {
    let base = format!("{}/upload", endpoint.trim_end_matches('/'));
    url::Url::parse(&base)
        .map_err(|e| ClipcastError::ConfigError(format!("invalid upload endpoint {}: {}", endpoint, e)))
}
