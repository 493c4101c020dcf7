//! Router configuration for the download API.
//!
//! # Route Structure
//!
//! ```text
//! /health                                  - Health check
//! /file/download/{filename}                - Stored file (GET or POST)
//! /file/download/{filename}/{*member}      - Member of a stored zip
//! /file/download/import/{filename}         - File in the import directory
//! ```
//!
//! # Example
//!
//! ```ignore
//! use asset_streamer::config::StoreConfig;
//! use asset_streamer::codec::SystemCodecs;
//! use asset_streamer::serve::FileService;
//! use asset_streamer::server::routes::{create_router, RouterConfig};
//!
//! let service = FileService::new(StoreConfig::new("/data/store", "/data/cache"), SystemCodecs::default());
//! let router = create_router(service, RouterConfig::new().with_cors_origins(vec![
//!     "https://example.com".to_string(),
//! ]));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::{
    ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE,
    RANGE,
};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    download_handler, health_handler, import_download_handler, member_download_handler, AppState,
};
use crate::codec::MediaCodecs;
use crate::serve::{FileService, CACHE_HIT_HEADER};

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration allowing any CORS origin, with tracing on.
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `file_service` - The service answering download requests
/// * `config` - Router configuration
pub fn create_router<C: MediaCodecs>(file_service: FileService<C>, config: RouterConfig) -> Router {
    let app_state = AppState::new(file_service);
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/file/download/{filename}",
            get(download_handler::<C>).post(download_handler::<C>),
        )
        .route(
            "/file/download/import/{filename}",
            get(import_download_handler::<C>),
        )
        .route(
            "/file/download/{filename}/{*member}",
            get(member_download_handler::<C>),
        )
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, RANGE])
        .expose_headers([
            ACCEPT_RANGES,
            CONTENT_DISPOSITION,
            CONTENT_LENGTH,
            CONTENT_RANGE,
            CACHE_HIT_HEADER,
        ])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
