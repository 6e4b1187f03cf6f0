use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::capture::Clip;
use crate::content::HashInfo;
use crate::error::{ClipcastError, ClipcastResult};
use crate::media::composition::CompositionResult;
use crate::upload::{AuthorizationToken, UploadDescriptor};

/// What the analyze stage learns about the asset to upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub size: u64,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub duration: Duration,
}

/// State shared by the stages of one publish run.
///
/// Each stage fills in its own slot; later stages read earlier slots through
/// the `require_*` accessors, which fail with `PipelineError` when a slot is
/// still empty.
#[derive(Debug)]
pub struct PublishContext {
    session_id: Uuid,
    cancel: CancellationToken,
    clips: Vec<Clip>,

    pub composition: Option<CompositionResult>,
    pub media: Option<MediaInfo>,
    pub thumbnail: Option<PathBuf>,
    pub placeholder: Option<String>,
    pub content_hash: Option<HashInfo>,
    pub token: Option<AuthorizationToken>,
    pub descriptor: Option<UploadDescriptor>,
    pub upload_attempts: u32,
    pub event_id: Option<String>,

    /// Files created by this run, discarded when it ends
    temp_files: Vec<PathBuf>,

    metadata: HashMap<String, String>,
}

fn missing(what: &str) -> ClipcastError {
    ClipcastError::PipelineError(format!("Required context value not found: {}", what))
}

impl PublishContext {
    pub fn new(clips: Vec<Clip>, cancel: CancellationToken) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            cancel,
            clips,
            composition: None,
            media: None,
            thumbnail: None,
            placeholder: None,
            content_hash: None,
            token: None,
            descriptor: None,
            upload_attempts: 0,
            event_id: None,
            temp_files: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn require_composition(&self) -> ClipcastResult<&CompositionResult> {
        self.composition.as_ref().ok_or_else(|| missing("composition"))
    }

    pub fn require_media(&self) -> ClipcastResult<&MediaInfo> {
        self.media.as_ref().ok_or_else(|| missing("media info"))
    }

    pub fn require_hash(&self) -> ClipcastResult<&HashInfo> {
        self.content_hash.as_ref().ok_or_else(|| missing("content hash"))
    }

    pub fn require_descriptor(&self) -> ClipcastResult<&UploadDescriptor> {
        self.descriptor.as_ref().ok_or_else(|| missing("upload descriptor"))
    }

    /// Register a file this run created. Clip files are never accepted.
    pub fn add_temp_file(&mut self, path: PathBuf) {
        if self.is_clip(&path) || self.temp_files.contains(&path) {
            return;
        }
        self.temp_files.push(path);
    }

    pub fn temp_files(&self) -> &[PathBuf] {
        &self.temp_files
    }

    pub fn clear_temp_files(&mut self) {
        self.temp_files.clear();
    }

    pub fn is_clip(&self, path: &Path) -> bool {
        self.clips.iter().any(|c| c.path == path)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}
