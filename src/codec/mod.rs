//! Codec collaborators.
//!
//! The serving core treats every codec as a black box behind the
//! [`MediaCodecs`] trait, so tests can count or replace calls and deployments
//! can swap the external tools.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            VariantResolver              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           MediaCodecs Trait             │
//! └────────────────────┬────────────────────┘
//!                      │
//!     ┌────────────────┼──────────────────┐
//!     ▼                ▼                  ▼
//! ┌──────────┐  ┌──────────────┐  ┌──────────────┐
//! │  image   │  │  gifsicle /  │  │ epub (zip +  │
//! │  crate   │  │  ffmpeg CLI  │  │  OPF lookup) │
//! └──────────┘  └──────────────┘  └──────────────┘
//! ```
//!
//! MIME sniffing lives in [`mime`] as plain functions; it has no state and
//! needs no seam.

mod epub;
pub mod mime;
mod raster;
mod tools;

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CodecError;

pub use raster::{
    clamp_quality, decode_oriented, encode, image_dimensions, resize_encode, OutputFormat,
    COVER_QUALITY, COVER_SIDE, DEFAULT_QUALITY, MAX_QUALITY, MIN_QUALITY,
};
pub use epub::{extract_epub_cover, find_cover_member};
pub use tools::{video_seek_seconds, SystemCodecs, ToolPaths};

/// Decoded raster image handed between codec calls.
pub type Image = image::DynamicImage;

/// Parameters for a gifsicle run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GifParams {
    /// Bounding box width
    pub width: u32,

    /// Bounding box height
    pub height: u32,

    /// Palette size (2-256)
    pub colors: u16,

    /// Lossy compression level (0 = lossless)
    pub lossy: u16,

    /// Optimization level (1-3)
    pub optimize: u8,
}

/// Codec operations the serving core depends on.
///
/// The synchronous methods are CPU bound and are always invoked from the
/// blocking pool. The async methods drive external processes or archives.
#[async_trait]
pub trait MediaCodecs: Send + Sync + 'static {
    /// Read `(width, height)` from the image header without decoding pixels.
    fn image_dimensions(&self, path: &Path) -> Result<(u32, u32), CodecError>;

    /// Decode an image, applying its EXIF orientation.
    fn decode_image(&self, data: &[u8]) -> Result<Image, CodecError>;

    /// Downscale to fit `max_width × max_height` (never upscale) and encode.
    fn resize_encode(
        &self,
        image: &Image,
        max_width: u32,
        max_height: u32,
        quality: u8,
        format: OutputFormat,
    ) -> Result<Bytes, CodecError>;

    /// Recompress the gif at `src` into `dst`.
    async fn gif_compress(&self, src: &Path, dst: &Path, params: &GifParams)
        -> Result<(), CodecError>;

    /// Grab a representative frame from a video.
    async fn video_cover_frame(&self, path: &Path) -> Result<Option<Image>, CodecError>;

    /// Extract embedded cover art from an audio file.
    async fn audio_cover_art(&self, path: &Path) -> Result<Option<Bytes>, CodecError>;

    /// Read the cover image member of an epub.
    async fn epub_cover(&self, path: &Path) -> Result<Option<Bytes>, CodecError>;
}
