//! Hand-off of the final media metadata to the social layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ClipcastError, ClipcastResult};
use crate::logger::{LogLevel, LOGGER};

/// Everything the publisher needs to announce an uploaded video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEvent {
    pub url: String,
    pub hash: String,
    pub size: u64,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Publishes media metadata; returns an opaque event identifier
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &MediaEvent) -> ClipcastResult<String>;
}

/// In-memory publisher for development and tests.
///
/// Records every event it receives and can be told to fail.
#[derive(Default)]
pub struct MockPublisher {
    published: Mutex<Vec<MediaEvent>>,
    failure: Mutex<Option<String>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following publish with `message`
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(|p| p.into_inner()) = Some(message.into());
    }

    pub fn published(&self) -> Vec<MediaEvent> {
        self.published
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl EventPublisher for MockPublisher {
    async fn publish(&self, event: &MediaEvent) -> ClipcastResult<String> {
        if let Some(message) = self.failure.lock()?.clone() {
            return Err(ClipcastError::PublishFailed(message));
        }
        self.published.lock()?.push(event.clone());

        let id = Uuid::new_v4().simple().to_string();
        LOGGER.log(
            LogLevel::Info,
            &format!("Published {} as event {}", event.url, id),
            "publisher",
        );
        Ok(id)
    }
}
