//! Asset Streamer - serves stored media with cached variants and range requests.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use asset_streamer::{
    config::Config,
    serve::FileService,
    server::{create_router, RouterConfig},
    SystemCodecs,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Asset Streamer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Store: {}", config.store_dir.display());
    info!("  Cache: {}", config.cache_dir.display());
    match &config.import_dir {
        Some(dir) => info!("  Import: {}", dir.display()),
        None => warn!("  Import: not configured, import downloads resolve under the store"),
    }
    info!(
        "  Tools: gifsicle={} ffmpeg={} ffprobe={}",
        config.gifsicle_bin, config.ffmpeg_bin, config.ffprobe_bin
    );

    for dir in [&config.store_dir, &config.cache_dir] {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            error!("Failed to create {}: {}", dir.display(), e);
            return ExitCode::FAILURE;
        }
    }

    let codecs = Arc::new(SystemCodecs::new(config.tool_paths()));
    let service = FileService::with_cache_max_age(config.store_config(), codecs, config.cache_max_age);
    let router = create_router(service, build_router_config(&config));

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);
    info!("  curl http://{}/health", addr);
    info!("  curl http://{}/file/download/<filename>?side=200", addr);

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "asset_streamer=debug,tower_http=debug"
    } else {
        "asset_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the command line configuration.
fn build_router_config(config: &Config) -> RouterConfig {
    let router_config = RouterConfig::new().with_tracing(!config.no_tracing);
    match &config.cors_origins {
        Some(origins) => router_config.with_cors_origins(origins.clone()),
        None => router_config,
    }
}
