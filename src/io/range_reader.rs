use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

use crate::error::IoError;

/// Trait for reading byte windows from a stored resource.
///
/// This abstraction lets the range engine and MIME sniffing treat plain files
/// and archive members the same way. Implementations must be thread-safe.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Get the total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Get a unique identifier for this resource (for logging).
    fn identifier(&self) -> &str;
}

/// Check that `[offset, offset + len)` lies inside a resource of `size` bytes.
pub(crate) fn check_bounds(offset: u64, len: usize, size: u64) -> Result<(), IoError> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(IoError::RangeOutOfBounds {
            offset,
            requested: len as u64,
            size,
        }),
    }
}

// =============================================================================
// Local File Reader
// =============================================================================

/// Range reader over a regular file on the local filesystem.
///
/// The file is opened per read, so a reader holds no descriptor between calls.
#[derive(Debug, Clone)]
pub struct LocalFileReader {
    path: PathBuf,
    size: u64,
    identifier: String,
}

impl LocalFileReader {
    /// Stat the file and create a reader for it.
    ///
    /// Directories and missing paths are reported as `NotFound`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(IoError::NotFound(path.display().to_string()));
        }

        Ok(Self {
            identifier: format!("file://{}", path.display()),
            size: metadata.len(),
            path,
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a stream over `[offset, offset + len)` without buffering it.
    pub async fn open_window(
        &self,
        offset: u64,
        len: u64,
    ) -> Result<impl AsyncRead + Send + Unpin + 'static, IoError> {
        let requested = usize::try_from(len).unwrap_or(usize::MAX);
        check_bounds(offset, requested, self.size)?;

        let mut file = File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        Ok(file.take(len))
    }
}

#[async_trait]
impl RangeReader for LocalFileReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_bounds(offset, len, self.size)?;

        let mut file = File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
