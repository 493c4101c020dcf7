//! Deterministic cache paths for derived artifacts.
//!
//! Every artifact lives at `cache_root/<source stem>/<descriptor>`. The
//! descriptor starts with a tag naming the transform and then lists every
//! parameter that influences the output bytes, `_`-delimited and
//! letter-prefixed, so distinct parameter sets never share a name.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::codec::OutputFormat;
use crate::error::IoError;
use crate::io::run_blocking;

/// A transform applied to a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    /// Plain resize at the default quality, in the source's family format
    Thumbnail {
        width: u32,
        height: u32,
        format: OutputFormat,
    },

    /// Resize at an explicit quality
    QualityThumbnail { width: u32, height: u32, quality: u8 },

    /// Gif recompression through gifsicle
    GifThumbnail {
        width: u32,
        height: u32,
        colors: u16,
        lossy: u16,
        optimize: u8,
        budget_kb: Option<u32>,
    },

    /// Resize under a byte budget
    CompressCacheThumbnail { width: u32, height: u32, budget_kb: u32 },

    /// Frame grabbed from a video
    VideoCover { width: u32, height: u32, quality: u8 },

    /// Cover image of an epub
    EpubCover { width: u32, height: u32, quality: u8 },
}

impl Transform {
    /// Literal tag leading the descriptor.
    pub fn tag(&self) -> &'static str {
        match self {
            Transform::Thumbnail { .. } => "thumbnail",
            Transform::QualityThumbnail { .. } => "qualityThumbnail",
            Transform::GifThumbnail { .. } => "gifThumbnail",
            Transform::CompressCacheThumbnail { .. } => "compressCacheThumbnail",
            Transform::VideoCover { .. } => "videoCover",
            Transform::EpubCover { .. } => "epubCover",
        }
    }

    /// Cache file name for this transform.
    pub fn descriptor(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())?;
        match *self {
            Transform::Thumbnail {
                width,
                height,
                format,
            } => write!(f, "_{}x{}_{}", width, height, format.extension()),
            Transform::QualityThumbnail {
                width,
                height,
                quality,
            }
            | Transform::VideoCover {
                width,
                height,
                quality,
            }
            | Transform::EpubCover {
                width,
                height,
                quality,
            } => write!(f, "_{}x{}_q{}", width, height, quality),
            Transform::GifThumbnail {
                width,
                height,
                colors,
                lossy,
                optimize,
                budget_kb,
            } => {
                write!(
                    f,
                    "_{}x{}_c{}_l{}_o{}",
                    width, height, colors, lossy, optimize
                )?;
                if let Some(kb) = budget_kb {
                    write!(f, "_s{}kb", kb)?;
                }
                Ok(())
            }
            Transform::CompressCacheThumbnail {
                width,
                height,
                budget_kb,
            } => write!(f, "_{}x{}_s{}kb", width, height, budget_kb),
        }
    }
}

/// Subdirectory holding artifacts of import-root files.
///
/// Descriptors always start with a transform tag, so this name never clashes
/// with an artifact of a store file sharing the stem.
pub const IMPORT_NAMESPACE: &str = "import";

/// Maps `(source, transform)` pairs to paths under the cache root.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
    namespace: Option<&'static str>,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            namespace: None,
        }
    }

    /// Keep artifacts in `cache_root/<stem>/<namespace>/` instead.
    pub fn with_namespace(mut self, namespace: &'static str) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every artifact derived from `source_name`.
    ///
    /// Named after the source's base name without its extension.
    pub fn dir_for(&self, source_name: &str) -> PathBuf {
        let base = Path::new(source_name)
            .file_name()
            .map(Path::new)
            .unwrap_or_else(|| Path::new(source_name));
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_name.to_string());
        let dir = self.root.join(stem);
        match self.namespace {
            Some(namespace) => dir.join(namespace),
            None => dir,
        }
    }

    /// Full cache path of `transform` applied to `source_name`.
    pub fn path_for(&self, source_name: &str, transform: &Transform) -> PathBuf {
        self.dir_for(source_name).join(transform.descriptor())
    }
}

/// Whether a cache artifact exists and is a regular file.
pub async fn artifact_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Write `data` to `path` atomically.
///
/// The bytes land in a temp file in the target directory (created on demand)
/// and are renamed into place, so readers never see a partial artifact.
pub async fn write_atomic(path: &Path, data: Bytes) -> Result<(), IoError> {
    let path = path.to_path_buf();
    run_blocking(move || {
        let dir = parent_dir(&path)?;
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&data)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| IoError::from(e.error))?;
        Ok(())
    })
    .await
}

/// Reserve a temp path next to `path` for tools that write their own output.
///
/// The returned handle deletes the file on drop unless persisted with
/// [`persist_temp`].
pub async fn temp_beside(path: &Path) -> Result<tempfile::TempPath, IoError> {
    let path = path.to_path_buf();
    run_blocking(move || {
        let dir = parent_dir(&path)?;
        std::fs::create_dir_all(&dir)?;
        Ok(tempfile::NamedTempFile::new_in(&dir)?.into_temp_path())
    })
    .await
}

/// Rename a temp file produced by [`temp_beside`] onto `path`.
pub async fn persist_temp(tmp: tempfile::TempPath, path: &Path) -> Result<(), IoError> {
    let path = path.to_path_buf();
    run_blocking(move || tmp.persist(&path).map_err(|e| IoError::from(e.error))).await
}

fn parent_dir(path: &Path) -> Result<PathBuf, IoError> {
    path.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| IoError::Fs(format!("{} has no parent directory", path.display())))
}
