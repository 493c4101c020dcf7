//! Test utilities for integration tests.
//!
//! This module provides a recording codec implementation and helpers for
//! building stores, fixture files and requests.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::codecs::gif::GifEncoder;
use image::{DynamicImage, Frame, ImageFormat, Rgb, RgbImage, RgbaImage};
use tempfile::TempDir;
use tower::ServiceExt;
use zip::write::SimpleFileOptions;

use asset_streamer::codec::{GifParams, Image, MediaCodecs, OutputFormat, SystemCodecs};
use asset_streamer::error::CodecError;
use asset_streamer::{create_router, FileService, RouterConfig, StoreConfig};

// =============================================================================
// Recording Codecs
// =============================================================================

/// Codecs that count calls and stand in for the external tools.
///
/// Raster work and epub covers go through [`SystemCodecs`]. gifsicle is
/// replaced by a file copy, ffmpeg by fixed outputs.
#[derive(Default)]
pub struct RecordingCodecs {
    inner: SystemCodecs,
    decodes: AtomicUsize,
    encodes: AtomicUsize,
    gif_runs: AtomicUsize,
    audio_art: Option<Bytes>,
    video_frame: Option<(u32, u32)>,
}

impl RecordingCodecs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embedded art returned for audio files.
    pub fn with_audio_art(mut self, art: Vec<u8>) -> Self {
        self.audio_art = Some(Bytes::from(art));
        self
    }

    /// Dimensions of the frame returned for video files.
    pub fn with_video_frame(mut self, width: u32, height: u32) -> Self {
        self.video_frame = Some((width, height));
        self
    }

    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn encode_count(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }

    pub fn gif_count(&self) -> usize {
        self.gif_runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaCodecs for RecordingCodecs {
    fn image_dimensions(&self, path: &Path) -> Result<(u32, u32), CodecError> {
        self.inner.image_dimensions(path)
    }

    fn decode_image(&self, data: &[u8]) -> Result<Image, CodecError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        self.inner.decode_image(data)
    }

    fn resize_encode(
        &self,
        image: &Image,
        max_width: u32,
        max_height: u32,
        quality: u8,
        format: OutputFormat,
    ) -> Result<Bytes, CodecError> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        self.inner
            .resize_encode(image, max_width, max_height, quality, format)
    }

    async fn gif_compress(
        &self,
        src: &Path,
        dst: &Path,
        _params: &GifParams,
    ) -> Result<(), CodecError> {
        self.gif_runs.fetch_add(1, Ordering::SeqCst);
        tokio::fs::copy(src, dst)
            .await
            .map(|_| ())
            .map_err(|e| CodecError::Tool {
                tool: "gifsicle",
                message: e.to_string(),
            })
    }

    async fn video_cover_frame(&self, _path: &Path) -> Result<Option<Image>, CodecError> {
        Ok(self
            .video_frame
            .map(|(w, h)| DynamicImage::ImageRgb8(gradient(w, h))))
    }

    async fn audio_cover_art(&self, _path: &Path) -> Result<Option<Bytes>, CodecError> {
        Ok(self.audio_art.clone())
    }

    async fn epub_cover(&self, path: &Path) -> Result<Option<Bytes>, CodecError> {
        self.inner.epub_cover(path).await
    }
}

// =============================================================================
// Test Store
// =============================================================================

/// Temporary store, import and cache directories behind a router.
pub struct TestStore {
    pub store: TempDir,
    pub import: TempDir,
    pub cache: TempDir,
    pub codecs: Arc<RecordingCodecs>,
}

impl TestStore {
    pub fn new() -> Self {
        Self::with_codecs(RecordingCodecs::new())
    }

    pub fn with_codecs(codecs: RecordingCodecs) -> Self {
        Self {
            store: TempDir::new().unwrap(),
            import: TempDir::new().unwrap(),
            cache: TempDir::new().unwrap(),
            codecs: Arc::new(codecs),
        }
    }

    /// Write a stored file.
    pub fn put(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.store.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    /// Write a file into the import directory.
    pub fn put_import(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.import.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    pub fn router(&self) -> Router {
        let config = StoreConfig::new(self.store.path(), self.cache.path())
            .with_import_root(self.import.path())
            .with_chunk_size(8 * 1024);
        let service = FileService::with_cache_max_age(config, Arc::clone(&self.codecs), 60);
        create_router(service, RouterConfig::new().with_tracing(false))
    }

    /// Every artifact currently under the cache directory.
    pub fn cache_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut pending = vec![self.cache.path().to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else if dir != self.cache.path() {
                    files.push(path);
                }
            }
        }
        files.sort();
        files
    }
}

// =============================================================================
// Requests
// =============================================================================

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_range(uri: &str, range: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::RANGE, range)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, json: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

// =============================================================================
// Fixtures
// =============================================================================

/// Smooth RGB gradient.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

/// Pseudo-random RGB noise, which compresses poorly.
pub fn noise(width: u32, height: u32) -> RgbImage {
    let mut state: u32 = 0x9E37_79B9;
    RgbImage::from_fn(width, height, |_, _| {
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xFF) as u8
        };
        Rgb([next(), next(), next()])
    })
}

fn encode_as(image: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buf, format)
        .unwrap();
    buf.into_inner()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode_as(gradient(width, height), ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode_as(gradient(width, height), ImageFormat::Jpeg)
}

pub fn noisy_jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode_as(noise(width, height), ImageFormat::Jpeg)
}

pub fn gif_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        let frame = RgbaImage::from_fn(width, height, |x, _| {
            image::Rgba([(x % 256) as u8, 0, 0, 255])
        });
        encoder.encode_frame(Frame::new(frame)).unwrap();
    }
    buf
}

/// Deterministic bytes where byte `i` is `i % 251`.
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Zip archive holding `members`, deflate-compressed.
pub fn zip_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in members {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Minimal epub whose manifest marks `cover` as the cover image.
pub fn epub_bytes(cover: &[u8]) -> Vec<u8> {
    let container = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;
    let opf = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata><meta name="cover" content="cover-img"/></metadata>
  <manifest>
    <item id="cover-img" href="images/cover.png" media-type="image/png"/>
    <item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
</package>"#;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file("mimetype", stored).unwrap();
    writer.write_all(b"application/epub+zip").unwrap();
    for (name, data) in [
        ("META-INF/container.xml", container.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/images/cover.png", cover),
        ("OEBPS/ch1.xhtml", b"<html/>".as_slice()),
    ] {
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Decode a response body as an image.
pub fn decode(data: &[u8]) -> DynamicImage {
    image::load_from_memory(data).unwrap()
}
