//! `MediaEngine` backed by the ffmpeg and ffprobe command line tools

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use uuid::Uuid;

use super::{AssetInfo, MediaEngine, Timeline};
use crate::error::{ClipcastError, ClipcastResult};
use crate::logger::{LogLevel, LOGGER};

const SILENCE_SOURCE: &str = "anullsrc=channel_layout=stereo:sample_rate=44100";

pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    async fn run(&self, program: &Path, args: &[String]) -> ClipcastResult<Vec<u8>> {
        LOGGER.log(
            LogLevel::Debug,
            &format!("Running {} {}", program.display(), args.join(" ")),
            "media::ffmpeg",
        );
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ClipcastError::Internal(format!("Failed to run {}: {}", program.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClipcastError::Internal(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

fn parse_probe(json: &[u8]) -> ClipcastResult<AssetInfo> {
    let probe: ProbeOutput = serde_json::from_slice(json)?;
    let duration = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| ClipcastError::Internal("ffprobe reported no duration".to_string()))?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(AssetInfo {
        duration,
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        has_video: video.is_some(),
        has_audio,
    })
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Arguments for concatenating the timeline into `output`.
///
/// Segments without audio get a generated silent track of the same length so
/// the concat filter always sees matching stream layouts.
pub fn build_export_args(timeline: &Timeline, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into()];
    let with_audio = timeline.has_audio();

    for segment in timeline.segments() {
        args.push("-i".into());
        args.push(path_arg(&segment.source));
    }

    // Silent inputs follow the real ones
    let mut audio_inputs = Vec::with_capacity(timeline.segments().len());
    let mut next_input = timeline.segments().len();
    if with_audio {
        for (i, segment) in timeline.segments().iter().enumerate() {
            if segment.has_audio {
                audio_inputs.push(i);
            } else {
                args.extend([
                    "-f".to_string(),
                    "lavfi".to_string(),
                    "-t".to_string(),
                    format!("{:.3}", segment.duration.as_secs_f64()),
                    "-i".to_string(),
                    SILENCE_SOURCE.to_string(),
                ]);
                audio_inputs.push(next_input);
                next_input += 1;
            }
        }
    }

    let mut filter = String::new();
    for i in 0..timeline.segments().len() {
        filter.push_str(&format!("[{}:v:0]", i));
        if let Some(audio) = audio_inputs.get(i) {
            filter.push_str(&format!("[{}:a:0]", audio));
        }
    }
    filter.push_str(&format!(
        "concat=n={}:v=1:a={}[outv]",
        timeline.segments().len(),
        if with_audio { 1 } else { 0 }
    ));
    if with_audio {
        filter.push_str("[outa]");
    }

    args.push("-filter_complex".into());
    args.push(filter);
    args.extend(["-map".to_string(), "[outv]".to_string()]);
    if with_audio {
        args.extend(["-map".to_string(), "[outa]".to_string()]);
        args.extend(["-c:a".to_string(), "aac".to_string()]);
    }
    args.extend([
        "-c:v".to_string(),
        "libx264".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        path_arg(output),
    ]);
    args
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn probe(&self, path: &Path) -> ClipcastResult<AssetInfo> {
        if !path.exists() {
            return Err(ClipcastError::FileNotFound(path.display().to_string()));
        }
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration:stream=codec_type,width,height".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path_arg(path),
        ];
        let stdout = self.run(&self.ffprobe, &args).await?;
        parse_probe(&stdout)
    }

    async fn export(&self, timeline: &Timeline, output: &Path) -> ClipcastResult<()> {
        if timeline.segments().is_empty() {
            return Err(ClipcastError::Internal("timeline is empty".to_string()));
        }
        let args = build_export_args(timeline, output);
        self.run(&self.ffmpeg, &args).await?;
        Ok(())
    }

    async fn grab_frame(&self, path: &Path, at: Duration) -> ClipcastResult<image::DynamicImage> {
        let frame_path = std::env::temp_dir().join(format!("clipcast_frame_{}.png", Uuid::new_v4()));
        let args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-ss".to_string(),
            format!("{:.3}", at.as_secs_f64()),
            "-i".to_string(),
            path_arg(path),
            "-frames:v".to_string(),
            "1".to_string(),
            path_arg(&frame_path),
        ];

        let result = match self.run(&self.ffmpeg, &args).await {
            Ok(_) => image::open(&frame_path).map_err(ClipcastError::from),
            Err(e) => Err(ClipcastError::ThumbnailGenerationFailed(e.to_string())),
        };
        let _ = tokio::fs::remove_file(&frame_path).await;
        result
    }
}
