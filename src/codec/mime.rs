//! MIME sniffing, reconciliation and classification.
//!
//! Content sniffing uses magic numbers (`infer`); filename extensions
//! (`mime_guess`) and a UTF-8 check fill in for formats without magic bytes.
//! The result is then reconciled with the hint a client supplied.

use std::path::Path;

use image::ImageFormat;

/// Generic binary MIME type.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Epub container MIME type.
pub const EPUB: &str = "application/epub+zip";

/// Sniff the MIME type of `head` (the leading bytes of a file).
///
/// `filename` is consulted when the bytes carry no magic number. `hint` is the
/// caller-supplied type, reconciled via [`reconcile`].
pub fn sniff_mime(head: &[u8], filename: Option<&str>, hint: Option<&str>) -> String {
    let parsed = infer::get(head)
        .map(|kind| kind.mime_type().to_string())
        .or_else(|| {
            filename
                .and_then(|name| mime_guess::from_path(name).first_raw())
                .map(str::to_string)
        })
        .or_else(|| looks_like_text(head).then(|| "text/plain".to_string()));

    reconcile(parsed.as_deref(), hint)
}

/// Reconcile a sniffed MIME type with a hint.
///
/// The hint wins when sniffing found nothing specific, or when both agree on
/// the top-level type and one subtype contains the other (`audio/x-flac` vs
/// `audio/flac` yields `audio/flac`). Otherwise the sniffed type wins.
pub fn reconcile(parsed: Option<&str>, hint: Option<&str>) -> String {
    let hint = match hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hint) => hint,
        None => return parsed.unwrap_or(OCTET_STREAM).to_string(),
    };

    let parsed = match parsed {
        Some(parsed) if parsed != OCTET_STREAM => parsed,
        _ => return hint.to_string(),
    };

    let (parsed_top, parsed_sub) = split(parsed);
    let (hint_top, hint_sub) = split(hint);
    if parsed_top == hint_top && (parsed_sub.contains(hint_sub) || hint_sub.contains(parsed_sub)) {
        return hint.to_string();
    }
    parsed.to_string()
}

fn split(mime: &str) -> (&str, &str) {
    match mime.split_once('/') {
        Some((top, sub)) => (top, sub),
        None => (mime, mime),
    }
}

fn looks_like_text(head: &[u8]) -> bool {
    !head.is_empty() && !head.contains(&0) && std::str::from_utf8(head).is_ok()
}

/// Guess the file extension (with leading dot, lowercase) for a file.
///
/// Prefers the filename's own extension when it is registered for `mime`,
/// then an extension matching the MIME subtype, then any registered
/// extension; the hint is tried the same way before falling back to the
/// filename's extension.
pub fn guess_extension(filename: &str, mime: &str, hint: Option<&str>) -> String {
    let own = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    let from_mime = |mime: &str| -> Option<String> {
        let candidates = mime_guess::get_mime_extensions_str(mime)?;
        if let Some(own) = own.as_deref() {
            if candidates.contains(&own) {
                return Some(own.to_string());
            }
        }
        let (_, sub) = split(mime);
        candidates
            .iter()
            .find(|ext| **ext == sub)
            .or_else(|| candidates.first())
            .map(|ext| ext.to_string())
    };

    from_mime(mime)
        .or_else(|| hint.and_then(from_mime))
        .or(own)
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// Audio, or an unidentified binary that might be audio.
pub fn is_audio(mime: &str) -> bool {
    mime == OCTET_STREAM || mime.starts_with("audio/")
}

/// Any video type.
pub fn is_video(mime: &str) -> bool {
    mime.starts_with("video/")
}

/// Epub container.
pub fn is_epub(mime: &str) -> bool {
    mime == EPUB
}

/// Any image type.
pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}

/// Gif image.
pub fn is_gif(mime: &str) -> bool {
    mime == "image/gif"
}

/// Image formats that can be decoded and re-encoded into derived variants.
pub fn compressible_format(mime: &str) -> Option<ImageFormat> {
    ImageFormat::from_mime_type(mime).filter(|format| {
        matches!(
            format,
            ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP | ImageFormat::Bmp
        )
    })
}

/// True for text, JSON and RTF types, which are served with a UTF-8 charset.
pub fn is_textual(mime: &str) -> bool {
    mime.starts_with("text/") || mime.contains("json") || mime.contains("rtf")
}

/// Content-Type header value for `mime`.
pub fn content_type(mime: &str) -> String {
    if is_textual(mime) && !mime.contains("charset") {
        format!("{};charset=UTF-8", mime)
    } else {
        mime.to_string()
    }
}
