//! HTTP response assembly.
//!
//! Turns a resolved body (file path, bounded reader or in-memory bytes) into a
//! 200 or 206 response with exact length and download headers.

use std::path::PathBuf;

use axum::{
    body::Body,
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

use crate::codec::mime;
use crate::config::{DEFAULT_CACHE_MAX_AGE, DEFAULT_CHUNK_SIZE};
use crate::error::{IoError, ServeError};

use super::range::RangeSpec;

/// Header reporting whether a derived artifact came from the cache.
pub const CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-cache-hit");

/// Where the response body comes from.
pub enum BodySource {
    /// A file on disk, streamed whole
    Path(PathBuf),

    /// A reader yielding exactly `length` bytes
    Reader {
        reader: Box<dyn AsyncRead + Send + Unpin>,
        length: u64,
    },

    /// Bytes already in memory
    Bytes(Bytes),
}

impl std::fmt::Debug for BodySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodySource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            BodySource::Reader { length, .. } => {
                f.debug_struct("Reader").field("length", length).finish()
            }
            BodySource::Bytes(data) => f.debug_tuple("Bytes").field(&data.len()).finish(),
        }
    }
}

/// Headers describing the served entity.
#[derive(Debug, Clone)]
pub struct EntityMeta {
    /// MIME type without charset
    pub mime: String,

    /// Name placed in `Content-Disposition`
    pub filename: String,

    /// Set for derived artifacts
    pub cache_hit: Option<bool>,
}

/// `Content-Disposition` value for `filename`.
pub fn content_disposition(filename: &str) -> String {
    format!("inline; filename*=utf-8''{}", urlencoding::encode(filename))
}

/// Builds 200 and 206 responses.
#[derive(Debug, Clone)]
pub struct ResponseAssembler {
    chunk_size: usize,
    cache_max_age: u32,
}

impl Default for ResponseAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CACHE_MAX_AGE)
    }
}

impl ResponseAssembler {
    pub fn new(chunk_size: usize, cache_max_age: u32) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            cache_max_age,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 200 response carrying the whole body.
    pub async fn full(&self, source: BodySource, meta: &EntityMeta) -> Result<Response, ServeError> {
        let (body, length) = self.body(source).await?;
        let builder = self
            .base(meta)
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, length);
        builder.body(body).map_err(build_error)
    }

    /// 206 response for `range` of a `total`-byte entity.
    ///
    /// `source` must already be limited to the window.
    pub async fn partial(
        &self,
        source: BodySource,
        range: RangeSpec,
        total: u64,
        meta: &EntityMeta,
    ) -> Result<Response, ServeError> {
        let (body, length) = self.body(source).await?;
        if length != range.length {
            return Err(ServeError::Io(IoError::RangeOutOfBounds {
                offset: range.start,
                requested: range.length,
                size: length,
            }));
        }

        let builder = self
            .base(meta)
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_LENGTH, length)
            .header(header::CONTENT_RANGE, range.content_range(total));
        builder.body(body).map_err(build_error)
    }

    fn base(&self, meta: &EntityMeta) -> axum::http::response::Builder {
        let mut builder = Response::builder()
            .header(header::CONTENT_TYPE, mime::content_type(&meta.mime))
            .header(header::CONTENT_DISPOSITION, content_disposition(&meta.filename))
            .header(header::ACCEPT_RANGES, "bytes")
            .header(
                header::CACHE_CONTROL,
                format!("public, max-age={}", self.cache_max_age),
            );
        if let Some(hit) = meta.cache_hit {
            builder = builder.header(CACHE_HIT_HEADER, hit.to_string());
        }
        builder
    }

    async fn body(&self, source: BodySource) -> Result<(Body, u64), ServeError> {
        match source {
            BodySource::Path(path) => {
                let file = tokio::fs::File::open(&path).await?;
                let length = file.metadata().await?.len();
                let stream = ReaderStream::with_capacity(file, self.chunk_size);
                Ok((Body::from_stream(stream), length))
            }
            BodySource::Reader { reader, length } => {
                let stream = ReaderStream::with_capacity(reader, self.chunk_size);
                Ok((Body::from_stream(stream), length))
            }
            BodySource::Bytes(data) => {
                let length = data.len() as u64;
                Ok((Body::from(data), length))
            }
        }
    }
}

fn build_error(e: axum::http::Error) -> ServeError {
    ServeError::Io(IoError::Fs(format!("invalid response: {}", e)))
}

// =============================================================================
// Error Mapping
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "codec_error")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

impl ServeError {
    /// Identifier used in the JSON error body.
    pub fn error_type(&self) -> &'static str {
        match self {
            ServeError::NotFound(_) => "not_found",
            ServeError::Unsupported { .. } => "unsupported_media_type",
            ServeError::Codec(_) => "codec_error",
            ServeError::MalformedRange(_) => "malformed_range",
            ServeError::Io(_) => "io_error",
        }
    }
}

/// Convert ServeError to HTTP response.
///
/// Every variant becomes a 404. Codec failures are logged at ERROR, storage
/// failures at WARN and the rest at DEBUG.
impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = StatusCode::NOT_FOUND;
        let error_type = self.error_type();
        let message = self.to_string();

        match &self {
            ServeError::Codec(_) => {
                error!(error_type = error_type, status = status.as_u16(), "Codec failure: {}", message);
            }
            ServeError::Io(_) => {
                warn!(error_type = error_type, status = status.as_u16(), "Storage error: {}", message);
            }
            _ => {
                debug!(error_type = error_type, status = status.as_u16(), "Resource not found: {}", message);
            }
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}
