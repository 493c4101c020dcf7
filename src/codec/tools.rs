//! Default [`MediaCodecs`] implementation.
//!
//! Raster work goes through the `image` crate; gif recompression, video frame
//! grabs and audio cover extraction shell out to `gifsicle`, `ffprobe` and
//! `ffmpeg`.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;
use tracing::debug;

use crate::error::CodecError;

use super::{epub, raster, GifParams, Image, MediaCodecs, OutputFormat};

/// Seek offset for videos shorter than five minutes.
const SHORT_VIDEO_SEEK_SECS: f64 = 15.0;

/// Seek offset for longer videos.
const LONG_VIDEO_SEEK_SECS: f64 = 600.0;

const LONG_VIDEO_THRESHOLD_SECS: f64 = 300.0;

/// Locations of the external binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub gifsicle: String,
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            gifsicle: "gifsicle".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

/// Timestamp (seconds) of the frame used as a video cover.
///
/// 15s into short videos, 10 minutes into long ones, but never past the middle.
pub fn video_seek_seconds(duration: f64) -> f64 {
    let preferred = if duration < LONG_VIDEO_THRESHOLD_SECS {
        SHORT_VIDEO_SEEK_SECS
    } else {
        LONG_VIDEO_SEEK_SECS
    };
    preferred.min(duration / 2.0).max(0.0)
}

/// Codecs backed by the `image` crate and system binaries.
#[derive(Debug, Clone, Default)]
pub struct SystemCodecs {
    tools: ToolPaths,
}

impl SystemCodecs {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    async fn probe_duration(&self, path: &Path) -> Result<Option<f64>, CodecError> {
        let output = run(
            "ffprobe",
            Command::new(&self.tools.ffprobe)
                .args(["-v", "error", "-show_entries", "format=duration"])
                .args(["-of", "default=noprint_wrappers=1:nokey=1"])
                .arg(path),
        )
        .await?;

        if !output.status.success() {
            return Ok(None);
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d >= 0.0))
    }
}

async fn run(tool: &'static str, command: &mut Command) -> Result<std::process::Output, CodecError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| CodecError::Tool {
            tool,
            message: format!("failed to spawn: {}", e),
        })
}

fn stderr_message(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("exited with {}: {}", output.status, stderr.trim())
}

#[async_trait]
impl MediaCodecs for SystemCodecs {
    fn image_dimensions(&self, path: &Path) -> Result<(u32, u32), CodecError> {
        raster::image_dimensions(path)
    }

    fn decode_image(&self, data: &[u8]) -> Result<Image, CodecError> {
        raster::decode_oriented(data)
    }

    fn resize_encode(
        &self,
        image: &Image,
        max_width: u32,
        max_height: u32,
        quality: u8,
        format: OutputFormat,
    ) -> Result<Bytes, CodecError> {
        raster::resize_encode(image, max_width, max_height, quality, format)
    }

    async fn gif_compress(
        &self,
        src: &Path,
        dst: &Path,
        params: &GifParams,
    ) -> Result<(), CodecError> {
        let output = run(
            "gifsicle",
            Command::new(&self.tools.gifsicle)
                .arg(format!("-O{}", params.optimize))
                .arg(format!("--lossy={}", params.lossy))
                .args(["--colors", params.colors.to_string().as_str()])
                .args(["--resize-fit", format!("{}x{}", params.width, params.height).as_str()])
                .arg(src)
                .arg("-o")
                .arg(dst),
        )
        .await?;

        if !output.status.success() {
            return Err(CodecError::Tool {
                tool: "gifsicle",
                message: stderr_message(&output),
            });
        }
        Ok(())
    }

    async fn video_cover_frame(&self, path: &Path) -> Result<Option<Image>, CodecError> {
        let seek = match self.probe_duration(path).await? {
            Some(duration) => video_seek_seconds(duration),
            None => 0.0,
        };
        debug!(path = %path.display(), seek, "Extracting video cover frame");

        let output = run(
            "ffmpeg",
            Command::new(&self.tools.ffmpeg)
                .args(["-v", "error", "-ss", format!("{:.3}", seek).as_str(), "-i"])
                .arg(path)
                .args(["-frames:v", "1", "-f", "image2pipe", "-c:v", "png", "-"]),
        )
        .await?;

        if !output.status.success() || output.stdout.is_empty() {
            debug!(path = %path.display(), detail = %stderr_message(&output), "No video frame");
            return Ok(None);
        }
        raster::decode_oriented(&output.stdout).map(Some)
    }

    async fn audio_cover_art(&self, path: &Path) -> Result<Option<Bytes>, CodecError> {
        let output = run(
            "ffmpeg",
            Command::new(&self.tools.ffmpeg)
                .args(["-v", "error", "-i"])
                .arg(path)
                .args(["-an", "-c:v", "copy", "-f", "image2pipe", "-"]),
        )
        .await?;

        if !output.status.success() || output.stdout.is_empty() {
            debug!(path = %path.display(), "No embedded audio cover");
            return Ok(None);
        }
        Ok(Some(Bytes::from(output.stdout)))
    }

    async fn epub_cover(&self, path: &Path) -> Result<Option<Bytes>, CodecError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || epub::extract_epub_cover(&path))
            .await
            .map_err(|e| CodecError::Container(format!("blocking task failed: {}", e)))?
    }
}
