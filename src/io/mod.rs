//! I/O layer: byte-window access to stored files and zip members.

mod range_reader;
mod zip_member;

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

pub use range_reader::{LocalFileReader, RangeReader};
pub use zip_member::ZipMemberReader;
pub(crate) use zip_member::{open_archive, run_blocking};

/// Number of leading bytes read for content sniffing.
pub const SNIFF_LEN: usize = 2048;

/// A stored file, or one member of a stored zip archive.
#[derive(Debug, Clone)]
pub enum VirtualFile {
    Plain(LocalFileReader),
    ZipMember(ZipMemberReader),
}

impl VirtualFile {
    /// Open `path`, or the member `member` inside it when given.
    pub async fn open(path: &Path, member: Option<&str>) -> Result<Self, IoError> {
        match member {
            Some(member) => Ok(Self::ZipMember(ZipMemberReader::open(path, member).await?)),
            None => Ok(Self::Plain(LocalFileReader::open(path).await?)),
        }
    }

    /// Name a download of this file should carry, if it differs from the outer file.
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::Plain(_) => None,
            Self::ZipMember(member) => Some(member.base_name()),
        }
    }

    /// Leading bytes used for MIME sniffing.
    pub async fn head(&self) -> Result<Bytes, IoError> {
        let len = self.size().min(SNIFF_LEN as u64) as usize;
        self.read_exact_at(0, len).await
    }
}

#[async_trait]
impl RangeReader for VirtualFile {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        match self {
            Self::Plain(reader) => reader.read_exact_at(offset, len).await,
            Self::ZipMember(reader) => reader.read_exact_at(offset, len).await,
        }
    }

    fn size(&self) -> u64 {
        match self {
            Self::Plain(reader) => reader.size(),
            Self::ZipMember(reader) => reader.size(),
        }
    }

    fn identifier(&self) -> &str {
        match self {
            Self::Plain(reader) => reader.identifier(),
            Self::ZipMember(reader) => reader.identifier(),
        }
    }
}
