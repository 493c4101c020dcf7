//! Epub cover lookup.
//!
//! `META-INF/container.xml` names the package document (OPF). The cover is the
//! manifest item referenced by `<meta name="cover" content="..."/>`, falling
//! back to the EPUB3 `properties="cover-image"` item and finally to any image
//! item whose id or href mentions "cover".

use std::io::{Read, Seek};
use std::path::Path;

use bytes::Bytes;
use roxmltree::{Document, Node, ParsingOptions};
use zip::ZipArchive;

use crate::error::{CodecError, IoError};
use crate::io::open_archive;

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Largest container, package document or cover image read from a book.
const MAX_MEMBER_BYTES: u64 = 32 * 1024 * 1024;

fn container_error(e: impl std::fmt::Display) -> CodecError {
    CodecError::Container(e.to_string())
}

fn parse(xml: &str) -> Result<Document<'_>, CodecError> {
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;
    Document::parse_with_options(xml, options).map_err(container_error)
}

fn read_member<R: Read + Seek>(zip: &mut ZipArchive<R>, name: &str) -> Result<Option<Vec<u8>>, CodecError> {
    read_member_capped(zip, name, MAX_MEMBER_BYTES)
}

/// Read a member of at most `limit` bytes.
///
/// The declared size is not trusted for allocation; reading stops one byte
/// past `limit`.
fn read_member_capped<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    name: &str,
    limit: u64,
) -> Result<Option<Vec<u8>>, CodecError> {
    let entry = match zip.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(container_error(e)),
    };
    let mut buf = Vec::new();
    entry
        .take(limit.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(container_error)?;
    if buf.len() as u64 > limit {
        return Err(CodecError::Container(format!(
            "{} exceeds {} bytes",
            name, limit
        )));
    }
    Ok(Some(buf))
}

/// Extract the cover image bytes of the epub at `path`.
///
/// Returns `Ok(None)` when the book declares no cover or the referenced member
/// is missing. Blocking; call from the blocking pool.
pub fn extract_epub_cover(path: &Path) -> Result<Option<Bytes>, CodecError> {
    let mut zip = open_archive(path).map_err(|e| match e {
        IoError::NotFound(what) => CodecError::Container(format!("not found: {}", what)),
        other => container_error(other),
    })?;

    let container = match read_member(&mut zip, CONTAINER_PATH)? {
        Some(data) => String::from_utf8(data).map_err(container_error)?,
        None => return Ok(None),
    };
    let rootfile = match rootfile_path(&container)? {
        Some(rootfile) => rootfile,
        None => return Ok(None),
    };

    let opf = match read_member(&mut zip, &rootfile)? {
        Some(data) => String::from_utf8(data).map_err(container_error)?,
        None => return Ok(None),
    };
    let member = match find_cover_member(&opf, &rootfile)? {
        Some(member) => member,
        None => return Ok(None),
    };

    Ok(read_member(&mut zip, &member)?.map(Bytes::from))
}

/// Path of the package document named by `container.xml`.
fn rootfile_path(container_xml: &str) -> Result<Option<String>, CodecError> {
    let doc = parse(container_xml)?;
    Ok(doc
        .descendants()
        .find(|n| n.tag_name().name() == "rootfile")
        .and_then(|n| n.attribute("full-path"))
        .map(str::to_string))
}

/// Resolve the archive member holding the cover image, given the OPF text and
/// the OPF's own member path.
pub fn find_cover_member(opf_xml: &str, opf_path: &str) -> Result<Option<String>, CodecError> {
    let doc = parse(opf_xml)?;
    let items: Vec<Node<'_, '_>> = doc
        .descendants()
        .filter(|n| n.tag_name().name() == "item")
        .collect();

    let by_meta = doc
        .descendants()
        .find(|n| n.tag_name().name() == "meta" && n.attribute("name") == Some("cover"))
        .and_then(|meta| meta.attribute("content"))
        .and_then(|id| items.iter().find(|item| item.attribute("id") == Some(id)));

    let by_property = || {
        items.iter().find(|item| {
            item.attribute("properties")
                .is_some_and(|props| props.split_whitespace().any(|p| p == "cover-image"))
        })
    };

    let by_name = || {
        items.iter().find(|item| {
            let is_image = item
                .attribute("media-type")
                .is_some_and(|m| m.starts_with("image/"));
            let mentions_cover = ["id", "href"].iter().any(|attr| {
                item.attribute(*attr)
                    .is_some_and(|v| v.to_lowercase().contains("cover"))
            });
            is_image && mentions_cover
        })
    };

    let href = by_meta
        .or_else(by_property)
        .or_else(by_name)
        .and_then(|item| item.attribute("href"));

    Ok(href.map(|href| resolve_href(opf_path, href)))
}

/// Resolve an OPF-relative href to an archive member path.
fn resolve_href(opf_path: &str, href: &str) -> String {
    let href = urlencoding::decode(href)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| href.to_string());
    let href = href.split('#').next().unwrap_or_default();

    let mut parts: Vec<&str> = match opf_path.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').filter(|p| !p.is_empty()).collect(),
        None => Vec::new(),
    };
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
