//! Configuration management for Asset Streamer.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `ASSET_` prefix
//! - Sensible defaults for all optional settings
//!
//! The parsed [`Config`] is only used at startup. The serving core receives an
//! explicitly constructed [`StoreConfig`] instead of reading global state.
//!
//! # Environment Variables
//!
//! - `ASSET_HOST` - Server bind address (default: 0.0.0.0)
//! - `ASSET_PORT` - Server port (default: 3000)
//! - `ASSET_STORE_DIR` - Directory holding stored files (required)
//! - `ASSET_CACHE_DIR` - Directory holding derived artifacts (required)
//! - `ASSET_IMPORT_DIR` - Directory holding imported files (optional)
//! - `ASSET_CHUNK_SIZE` - Streaming chunk size in bytes (default: 256KB)
//! - `ASSET_GIFSICLE` / `ASSET_FFMPEG` / `ASSET_FFPROBE` - External tool binaries
//! - `ASSET_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)

use std::path::PathBuf;

use clap::Parser;

use crate::codec::ToolPaths;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default streaming chunk size in bytes (256KB).
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// Store Configuration
// =============================================================================

/// Directories and tuning values handed to the serving core.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory of stored files
    pub store_root: PathBuf,

    /// Root directory of imported files (falls back to the store root)
    pub import_root: Option<PathBuf>,

    /// Root directory of derived artifacts
    pub cache_root: PathBuf,

    /// Chunk size used when streaming whole files
    pub chunk_size: usize,
}

impl StoreConfig {
    /// Create a store configuration with the default chunk size and no import root.
    pub fn new(store_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            store_root: store_root.into(),
            import_root: None,
            cache_root: cache_root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the import root.
    pub fn with_import_root(mut self, import_root: impl Into<PathBuf>) -> Self {
        self.import_root = Some(import_root.into());
        self
    }

    /// Set the streaming chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Directory to look up a stored file in.
    pub fn root_for(&self, at_import: bool) -> &PathBuf {
        match (&self.import_root, at_import) {
            (Some(import_root), true) => import_root,
            _ => &self.store_root,
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Asset Streamer - serves stored media with cached variants and range requests.
#[derive(Parser, Debug, Clone)]
#[command(name = "asset-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "ASSET_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "ASSET_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory containing stored files.
    #[arg(long, env = "ASSET_STORE_DIR")]
    pub store_dir: PathBuf,

    /// Directory where derived artifacts are cached.
    #[arg(long, env = "ASSET_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Directory containing imported files.
    #[arg(long, env = "ASSET_IMPORT_DIR")]
    pub import_dir: Option<PathBuf>,

    /// Chunk size in bytes used when streaming whole files.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, env = "ASSET_CHUNK_SIZE")]
    pub chunk_size: usize,

    // =========================================================================
    // External Tools
    // =========================================================================
    /// gifsicle binary used for gif variants.
    #[arg(long, default_value = "gifsicle", env = "ASSET_GIFSICLE")]
    pub gifsicle_bin: String,

    /// ffmpeg binary used for video and audio covers.
    #[arg(long, default_value = "ffmpeg", env = "ASSET_FFMPEG")]
    pub ffmpeg_bin: String,

    /// ffprobe binary used to read video durations.
    #[arg(long, default_value = "ffprobe", env = "ASSET_FFPROBE")]
    pub ffprobe_bin: String,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "ASSET_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "ASSET_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.store_dir.as_os_str().is_empty() {
            return Err("Store directory is required. Set --store-dir or ASSET_STORE_DIR".to_string());
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err("Cache directory is required. Set --cache-dir or ASSET_CACHE_DIR".to_string());
        }
        if self.cache_dir == self.store_dir {
            return Err("cache_dir must differ from store_dir".to_string());
        }

        if self.chunk_size < 4 * 1024 || self.chunk_size > 16 * 1024 * 1024 {
            return Err("chunk_size must be between 4KB and 16MB".to_string());
        }

        if self.gifsicle_bin.is_empty() || self.ffmpeg_bin.is_empty() || self.ffprobe_bin.is_empty()
        {
            return Err("external tool paths must not be empty".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build the store configuration passed to the serving core.
    pub fn store_config(&self) -> StoreConfig {
        let config = StoreConfig::new(&self.store_dir, &self.cache_dir).with_chunk_size(self.chunk_size);
        match &self.import_dir {
            Some(dir) => config.with_import_root(dir),
            None => config,
        }
    }

    /// Paths of the external tools used by the default codecs.
    pub fn tool_paths(&self) -> ToolPaths {
        ToolPaths {
            gifsicle: self.gifsicle_bin.clone(),
            ffmpeg: self.ffmpeg_bin.clone(),
            ffprobe: self.ffprobe_bin.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
