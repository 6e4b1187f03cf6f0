use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{AssetInfo, MediaEngine, Timeline};
use crate::capture::simulated::{decode_sim_media, encode_sim_media, SIM_MAGIC};
use crate::error::{ClipcastError, ClipcastResult};

/// Media engine for files written by the simulated capture device.
///
/// Probing reads the duration recorded in the file, exporting writes a new
/// simulated file covering the whole timeline, and frame grabs produce a
/// gradient whose colours depend on the timestamp.
pub struct SimulatedMediaEngine {
    width: u32,
    height: u32,
    has_audio: AtomicBool,
    fail_export: AtomicBool,
    fail_frame: AtomicBool,
}

impl Default for SimulatedMediaEngine {
    fn default() -> Self {
        Self::new(1080, 1920)
    }
}

impl SimulatedMediaEngine {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            has_audio: AtomicBool::new(true),
            fail_export: AtomicBool::new(false),
            fail_frame: AtomicBool::new(false),
        }
    }

    pub fn set_has_audio(&self, has_audio: bool) {
        self.has_audio.store(has_audio, Ordering::SeqCst);
    }

    /// Make exports write a truncated file and then fail
    pub fn set_fail_export(&self, fail: bool) {
        self.fail_export.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_frame(&self, fail: bool) {
        self.fail_frame.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaEngine for SimulatedMediaEngine {
    async fn probe(&self, path: &Path) -> ClipcastResult<AssetInfo> {
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ClipcastError::FileNotFound(path.display().to_string()),
            _ => ClipcastError::Io(e),
        })?;
        let duration = decode_sim_media(&bytes).ok_or_else(|| {
            ClipcastError::Internal(format!("{} is not a simulated media file", path.display()))
        })?;
        Ok(AssetInfo {
            duration,
            width: self.width,
            height: self.height,
            has_video: true,
            has_audio: self.has_audio.load(Ordering::SeqCst),
        })
    }

    async fn export(&self, timeline: &Timeline, output: &Path) -> ClipcastResult<()> {
        if self.fail_export.load(Ordering::SeqCst) {
            tokio::fs::write(output, SIM_MAGIC).await?;
            return Err(ClipcastError::Internal("export session failed".to_string()));
        }
        tokio::fs::write(output, encode_sim_media(timeline.duration())).await?;
        Ok(())
    }

    async fn grab_frame(&self, path: &Path, at: Duration) -> ClipcastResult<DynamicImage> {
        if self.fail_frame.load(Ordering::SeqCst) {
            return Err(ClipcastError::ThumbnailGenerationFailed(
                "frame could not be decoded".to_string(),
            ));
        }
        let info = self.probe(path).await?;
        if at > info.duration {
            return Err(ClipcastError::ThumbnailGenerationFailed(format!(
                "{:?} is past the end of the asset",
                at
            )));
        }
        let shade = (at.as_millis() % 256) as u8;
        let (w, h) = (self.width.min(320), self.height.min(320));
        let image = RgbImage::from_fn(w, h, |x, y| {
            Rgb([
                (x * 255 / w.max(1)) as u8,
                (y * 255 / h.max(1)) as u8,
                shade,
            ])
        });
        Ok(DynamicImage::ImageRgb8(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_probe_and_export() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.mov");
        std::fs::write(&a, encode_sim_media(Duration::from_millis(1200))).unwrap();

        let engine = SimulatedMediaEngine::default();
        let info = engine.probe(&a).await.unwrap();
        assert_eq!(info.duration, Duration::from_millis(1200));
        assert_eq!((info.width, info.height), (1080, 1920));

        let mut timeline = Timeline::new();
        timeline.append(a.clone(), info.duration, true);
        timeline.append(a.clone(), info.duration, true);
        let out = dir.path().join("out.mp4");
        engine.export(&timeline, &out).await.unwrap();
        assert_eq!(
            engine.probe(&out).await.unwrap().duration,
            Duration::from_millis(2400)
        );
    }

    #[tokio::test]
    async fn test_probe_rejects_unknown_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("real.mp4");
        std::fs::write(&path, b"....ftyp").unwrap();
        let engine = SimulatedMediaEngine::default();
        assert!(engine.probe(&path).await.is_err());
        assert!(matches!(
            engine.probe(&dir.path().join("missing")).await,
            Err(ClipcastError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_grab_frame_bounds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mov");
        std::fs::write(&path, encode_sim_media(Duration::from_secs(1))).unwrap();
        let engine = SimulatedMediaEngine::new(64, 48);

        let frame = engine.grab_frame(&path, Duration::ZERO).await.unwrap();
        assert_eq!((frame.width(), frame.height()), (64, 48));
        assert!(engine.grab_frame(&path, Duration::from_secs(2)).await.is_err());
    }
}
