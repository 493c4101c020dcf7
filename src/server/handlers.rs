//! HTTP request handlers for the download API.
//!
//! # Endpoints
//!
//! - `GET|POST /file/download/{filename}` - Serve a stored file
//! - `GET /file/download/{filename}/{*member}` - Serve one member of a stored zip
//! - `GET /file/download/import/{filename}` - Serve a file from the import directory
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::debug;

use crate::codec::MediaCodecs;
use crate::serve::{FileService, ServeRequest};
use crate::variant::RawServeParams;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the file service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<C: MediaCodecs> {
    /// The file service answering download requests
    pub file_service: Arc<FileService<C>>,
}

impl<C: MediaCodecs> AppState<C> {
    /// Create a new application state with the given file service.
    pub fn new(file_service: FileService<C>) -> Self {
        Self {
            file_service: Arc::new(file_service),
        }
    }
}

impl<C: MediaCodecs> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            file_service: Arc::clone(&self.file_service),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Parameter Extraction
// =============================================================================

/// Merge query parameters with an optional JSON body.
///
/// Query values win over body values. A body that is empty or not a JSON
/// object is ignored.
fn collect_params(query: Result<Query<RawServeParams>, QueryRejection>, body: &Bytes) -> RawServeParams {
    let query = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            debug!(error = %rejection, "Ignoring unparseable query string");
            RawServeParams::default()
        }
    };

    if body.iter().all(u8::is_ascii_whitespace) {
        return query;
    }
    match serde_json::from_slice::<RawServeParams>(body) {
        Ok(from_body) => query.merge(from_body),
        Err(e) => {
            debug!(error = %e, "Ignoring non-JSON request body");
            query
        }
    }
}

fn range_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn serve_download<C: MediaCodecs>(
    state: &AppState<C>,
    filename: &str,
    at_import: bool,
    member: Option<&str>,
    params: RawServeParams,
    headers: &HeaderMap,
) -> Response {
    let path = match state.file_service.locate(filename, at_import) {
        Ok(path) => path,
        Err(e) => return e.into_response(),
    };

    let request = ServeRequest {
        range: range_header(headers),
        options: params.normalize(),
        from_import: at_import,
    };

    state
        .file_service
        .serve_partial_or_full(&request, &path, member, filename)
        .await
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle download requests for stored files.
///
/// # Endpoint
///
/// `GET /file/download/{filename}` or `POST /file/download/{filename}`
///
/// # Parameters
///
/// Taken from the query string, or from a JSON body:
///
/// - `side`: bounding side in pixels for image variants
/// - `scale`: side multiplier, 1 to 4
/// - `size`: byte budget in KB
/// - `quality`: `"high"`, `"low"` or a number up to 85
/// - `cover`: serve the cover of an audio, video or epub file
/// - `mime`: MIME type hint
/// - `name`: download name override
///
/// # Response
///
/// - `200 OK`: whole file or derived variant
/// - `206 Partial Content`: when a `Range` header is present
/// - `404 Not Found`: for every failure
///
/// # Headers
///
/// - `Content-Disposition: inline; filename*=utf-8''{name}`
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Cache-Hit: true|false` for derived variants
pub async fn download_handler<C: MediaCodecs>(
    State(state): State<AppState<C>>,
    Path(filename): Path<String>,
    query: Result<Query<RawServeParams>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params = collect_params(query, &body);
    serve_download(&state, &filename, false, None, params, &headers).await
}

/// Handle download requests for files in the import directory.
///
/// # Endpoint
///
/// `GET /file/download/import/{filename}`
pub async fn import_download_handler<C: MediaCodecs>(
    State(state): State<AppState<C>>,
    Path(filename): Path<String>,
    query: Result<Query<RawServeParams>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params = collect_params(query, &body);
    serve_download(&state, &filename, true, None, params, &headers).await
}

/// Handle download requests for a member of a stored zip archive.
///
/// # Endpoint
///
/// `GET /file/download/{filename}/{*member}`
///
/// The member is streamed as its own entity; `Range` requests address the
/// member's uncompressed bytes.
pub async fn member_download_handler<C: MediaCodecs>(
    State(state): State<AppState<C>>,
    Path((filename, member)): Path<(String, String)>,
    query: Result<Query<RawServeParams>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params = collect_params(query, &body);
    serve_download(&state, &filename, false, Some(&member), params, &headers).await
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
