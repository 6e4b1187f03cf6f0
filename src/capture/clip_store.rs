use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::error::ClipcastResult;
use crate::logger::{LogLevel, LOGGER};

/// One recorded segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: Uuid,
    pub path: PathBuf,
    pub duration: Duration,
    /// Insertion order, strictly increasing over the store's lifetime
    pub order: u64,
    pub created_at: DateTime<Utc>,
}

/// Ordered list of recorded clips.
///
/// The store owns the clip files: deleting a clip removes its file, and
/// dropping the store removes whatever is left.
#[derive(Debug, Default)]
pub struct ClipStore {
    clips: Vec<Clip>,
    next_order: u64,
}

impl ClipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, path: PathBuf, duration: Duration) -> Clip {
        let clip = Clip {
            id: Uuid::new_v4(),
            path,
            duration,
            order: self.next_order,
            created_at: Utc::now(),
        };
        self.next_order += 1;
        self.clips.push(clip.clone());
        clip
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn total_duration(&self) -> Duration {
        self.clips.iter().map(|c| c.duration).sum()
    }

    /// Remove the most recent clip and its file.
    ///
    /// The clip stays in the list when its file cannot be removed.
    pub fn delete_last(&mut self) -> ClipcastResult<Option<Clip>> {
        let Some(clip) = self.clips.last() else {
            return Ok(None);
        };
        remove_clip_file(&clip.path)?;
        Ok(self.clips.pop())
    }

    /// Remove every clip; returns how many were removed.
    ///
    /// Clips whose files cannot be removed are kept, in order, and the first
    /// failure is returned.
    pub fn delete_all(&mut self) -> ClipcastResult<usize> {
        let before = self.clips.len();
        let mut first_error = None;
        self.clips.retain(|clip| match remove_clip_file(&clip.path) {
            Ok(()) => false,
            Err(e) => {
                first_error.get_or_insert(e);
                true
            }
        });
        match first_error {
            Some(e) => Err(e),
            None => Ok(before),
        }
    }
}

impl Drop for ClipStore {
    fn drop(&mut self) {
        if let Err(e) = self.delete_all() {
            LOGGER.log(
                LogLevel::Warn,
                &format!("Failed to release clip files: {}", e),
                "capture",
            );
        }
    }
}

fn remove_clip_file(path: &Path) -> ClipcastResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
