//! HTTP server layer.
//!
//! This module exposes the download API over Axum.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │        GET|POST /file/download/{filename}[/{*member}]           │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (params, Range header)   │  │  (router config, CORS)      │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └────────────────────────────────┬────────────────────────────────┘
//!                                  │
//!                                  ▼
//!                        serve::FileService
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    download_handler, health_handler, import_download_handler, member_download_handler, AppState,
    HealthResponse,
};
pub use routes::{create_router, RouterConfig};
