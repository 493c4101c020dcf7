//! # Asset Streamer
//!
//! Serves stored media files over HTTP with on-demand derived variants and
//! byte-range support, including ranges into members of stored zip archives.
//!
//! ## Features
//!
//! - **Range serving**: `bytes=a-b`, `bytes=a-` and `bytes=-n` on plain files and zip members
//! - **Derived variants**: bounded thumbnails, quality variants and byte-budget variants of images
//! - **Gif variants**: resized and palette-reduced through gifsicle
//! - **Covers**: embedded art of audio files, frames of videos, and epub cover images
//! - **Disk cache**: deterministic artifact paths, written atomically and reused across requests
//!
//! ## Architecture
//!
//! - [`io`] - Byte-window readers over plain files and zip members
//! - [`codec`] - MIME sniffing and the codec collaborators behind [`codec::MediaCodecs`]
//! - [`variant`] - Parameter normalization, cache naming and variant resolution
//! - [`serve`] - Range parsing, response assembly and the [`FileService`] entry point
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use asset_streamer::{create_router, FileService, RouterConfig, StoreConfig, SystemCodecs};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let store = StoreConfig::new("/data/store", "/data/cache").with_import_root("/data/import");
//!     let service = FileService::new(store, SystemCodecs::default());
//!     let router = create_router(service, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod io;
pub mod serve;
pub mod server;
pub mod variant;

// Re-export commonly used types
pub use codec::{GifParams, MediaCodecs, SystemCodecs, ToolPaths};
pub use config::{Config, StoreConfig};
pub use error::{CodecError, IoError, ServeError};
pub use io::{LocalFileReader, RangeReader, VirtualFile, ZipMemberReader};
pub use serve::{
    parse_range_header, ErrorResponse, FileService, RangeSpec, ResponseAssembler, ServeRequest,
    CACHE_HIT_HEADER,
};
pub use server::{create_router, health_handler, AppState, HealthResponse, RouterConfig};
pub use variant::{
    CacheLayout, QualityTargeter, RawServeParams, Resolved, ServeOptions, Transform,
    VariantResolver,
};
