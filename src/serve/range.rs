//! `Range` header parsing.
//!
//! Supported forms, resolved against the total resource size:
//!
//! - `bytes=-500`: the last 500 bytes
//! - `bytes=500-`: from byte 500 to the end
//! - `bytes=500-999`: bytes 500 through 999 inclusive
//!
//! Only the first range of a multi-range header is honored. An explicit end
//! past the resource is clamped to the last byte and an oversized suffix to
//! the whole resource. Ranges that resolve to no bytes are rejected.

use crate::error::ServeError;

/// A resolved byte window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    /// First byte (inclusive)
    pub start: u64,

    /// Number of bytes, always at least 1
    pub length: u64,
}

impl RangeSpec {
    /// Last byte (inclusive).
    pub fn end(&self) -> u64 {
        self.start + self.length - 1
    }

    /// `Content-Range` header value.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end(), total)
    }
}

fn malformed(header: &str, reason: &str) -> ServeError {
    ServeError::MalformedRange(format!("{:?}: {}", header, reason))
}

fn parse_bound(header: &str, value: &str) -> Result<u64, ServeError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| malformed(header, "bound is not a non-negative integer"))
}

/// Parse a `Range` header against a resource of `total` bytes.
pub fn parse_range_header(header: &str, total: u64) -> Result<RangeSpec, ServeError> {
    let spec = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(|| malformed(header, "unit must be bytes"))?;
    let first = spec.split(',').next().unwrap_or_default().trim();

    let (start, end) = first
        .split_once('-')
        .ok_or_else(|| malformed(header, "missing '-'"))?;
    let (start, end) = (start.trim(), end.trim());

    if total == 0 {
        return Err(malformed(header, "resource is empty"));
    }

    let range = match (start.is_empty(), end.is_empty()) {
        (true, true) => return Err(malformed(header, "no bounds")),
        (true, false) => {
            let suffix = parse_bound(header, end)?.min(total);
            RangeSpec {
                start: total - suffix,
                length: suffix,
            }
        }
        (false, true) => {
            let start = parse_bound(header, start)?;
            RangeSpec {
                start,
                length: total.saturating_sub(start),
            }
        }
        (false, false) => {
            let start = parse_bound(header, start)?;
            let end = parse_bound(header, end)?.min(total - 1);
            if end < start {
                return Err(malformed(header, "end before start"));
            }
            RangeSpec {
                start,
                length: end - start + 1,
            }
        }
    };

    if range.length == 0 || range.start >= total {
        return Err(malformed(header, "range is not satisfiable"));
    }
    Ok(range)
}
