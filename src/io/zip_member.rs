//! Zip members addressed as standalone byte streams.
//!
//! Deflated entries have no random access, so a window read decompresses the
//! entry from its start, discards everything before the window and returns
//! exactly the requested bytes. The archive is reopened per read and closed
//! when the blocking task returns.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;
use tokio_util::io::SyncIoBridge;
use tracing::debug;
use zip::ZipArchive;

use crate::error::IoError;

use super::range_reader::{check_bounds, RangeReader};

/// Range reader over one entry of a zip archive.
#[derive(Debug, Clone)]
pub struct ZipMemberReader {
    archive: PathBuf,
    member: String,
    size: u64,
    identifier: String,
}

impl ZipMemberReader {
    /// Open `member` inside `archive` and record its uncompressed size.
    pub async fn open(archive: impl AsRef<Path>, member: &str) -> Result<Self, IoError> {
        let archive = archive.as_ref().to_path_buf();
        let member = normalize_member_name(member);
        if member.is_empty() {
            return Err(IoError::NotFound("empty archive member name".to_string()));
        }

        let size = {
            let archive = archive.clone();
            let member = member.clone();
            run_blocking(move || {
                let mut zip = open_archive(&archive)?;
                let entry = zip.by_name(&member)?;
                if entry.is_dir() {
                    return Err(IoError::NotFound(format!("{} is a directory", member)));
                }
                Ok(entry.size())
            })
            .await?
        };

        Ok(Self {
            identifier: format!("zip://{}!{}", archive.display(), member),
            archive,
            member,
            size,
        })
    }

    /// Full member path inside the archive.
    pub fn member_name(&self) -> &str {
        &self.member
    }

    /// Last path component of the member name.
    pub fn base_name(&self) -> &str {
        self.member.rsplit('/').next().unwrap_or(&self.member)
    }

    /// Stream the whole member through an in-memory pipe of `buffer` bytes.
    ///
    /// Decompression runs on the blocking pool and stops early if the reader
    /// is dropped. Must be called from within the runtime.
    pub fn stream(&self, buffer: usize) -> impl AsyncRead + Send + Unpin + 'static {
        let (reader, writer) = tokio::io::duplex(buffer.max(1));
        let mut sink = SyncIoBridge::new(writer);
        let archive = self.archive.clone();
        let member = self.member.clone();

        tokio::task::spawn_blocking(move || {
            let copied = open_archive(&archive).and_then(|mut zip| {
                let mut entry = zip.by_name(&member)?;
                io::copy(&mut entry, &mut sink)?;
                Ok(())
            });
            if let Err(e) = copied {
                debug!(member = %member, error = %e, "Member stream ended early");
            }
        });

        reader
    }
}

#[async_trait]
impl RangeReader for ZipMemberReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_bounds(offset, len, self.size)?;

        let archive = self.archive.clone();
        let member = self.member.clone();
        run_blocking(move || {
            let mut zip = open_archive(&archive)?;
            let entry = zip.by_name(&member)?;
            read_window(entry, offset, len, &member)
        })
        .await
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Skip `offset` bytes of `entry` and read the next `len`.
///
/// Sizes come from the archive header, so the buffer only grows with bytes
/// actually decompressed. An entry shorter than declared is an error.
fn read_window(mut entry: impl Read, offset: u64, len: usize, member: &str) -> Result<Bytes, IoError> {
    let skipped = io::copy(&mut (&mut entry).take(offset), &mut io::sink())?;
    if skipped != offset {
        return Err(IoError::Archive(format!(
            "member {} ended after {} bytes, expected at least {}",
            member, skipped, offset
        )));
    }

    let mut buf = Vec::new();
    entry.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(IoError::Archive(format!(
            "member {} ended after {} bytes, expected {}",
            member,
            offset + buf.len() as u64,
            offset + len as u64
        )));
    }
    Ok(Bytes::from(buf))
}

/// Open a zip archive from disk.
pub(crate) fn open_archive(path: &Path) -> Result<ZipArchive<File>, IoError> {
    let file = File::open(path)?;
    Ok(ZipArchive::new(file)?)
}

/// Run blocking archive work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, IoError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, IoError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IoError::Fs(format!("blocking task failed: {}", e)))?
}

fn normalize_member_name(member: &str) -> String {
    member.trim_start_matches('/').replace('\\', "/")
}
