//! Request parameters, parsed once into typed serving options.
//!
//! Clients send parameters as query strings or JSON bodies, with numbers
//! sometimes quoted and flags given as `true`, `1` or `"true"`. The raw bag is
//! normalized here so the rest of the core only sees [`ServeOptions`].

use serde::Deserialize;
use serde_json::Value;

/// Quality used for the `"high"` hint and for unrecognized strings.
pub const HIGH_QUALITY: u8 = 85;

/// Quality used for the `"low"` hint.
pub const LOW_QUALITY: u8 = 40;

/// Upper bound for numeric quality hints.
pub const MAX_QUALITY_HINT: u8 = 85;

/// Bounds for the scale multiplier.
pub const MIN_SCALE: u32 = 1;
pub const MAX_SCALE: u32 = 4;

/// Loosely typed parameter bag as received from the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawServeParams {
    #[serde(default)]
    pub side: Option<Value>,
    #[serde(default)]
    pub scale: Option<Value>,
    #[serde(default)]
    pub size: Option<Value>,
    #[serde(default)]
    pub quality: Option<Value>,
    #[serde(default)]
    pub cover: Option<Value>,
    #[serde(default)]
    pub mime: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
}

impl RawServeParams {
    /// Fill fields missing here from `other`.
    pub fn merge(self, other: RawServeParams) -> Self {
        Self {
            side: self.side.or(other.side),
            scale: self.scale.or(other.scale),
            size: self.size.or(other.size),
            quality: self.quality.or(other.quality),
            cover: self.cover.or(other.cover),
            mime: self.mime.or(other.mime),
            name: self.name.or(other.name),
        }
    }

    /// Normalize into typed options.
    pub fn normalize(&self) -> ServeOptions {
        ServeOptions {
            side: self.side.as_ref().and_then(as_u32).unwrap_or(0),
            scale: self
                .scale
                .as_ref()
                .and_then(as_u32)
                .unwrap_or(MIN_SCALE)
                .clamp(MIN_SCALE, MAX_SCALE),
            size_kb: self.size.as_ref().and_then(as_u32).unwrap_or(0),
            quality: self.quality.as_ref().and_then(parse_quality),
            cover: self.cover.as_ref().is_some_and(as_flag),
            mime_hint: self.mime.as_ref().and_then(as_text),
            name: self.name.as_ref().and_then(as_text),
        }
    }
}

/// Typed serving options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeOptions {
    /// Requested bounding side in pixels (0 = unset)
    pub side: u32,

    /// Side multiplier, 1 to 4
    pub scale: u32,

    /// Byte budget in KB (0 = unset)
    pub size_kb: u32,

    /// Quality cap, 1 to 85
    pub quality: Option<u8>,

    /// Serve the cover image of an audio, video or epub file
    pub cover: bool,

    /// MIME type the client believes the file has
    pub mime_hint: Option<String>,

    /// Download name override
    pub name: Option<String>,
}

impl ServeOptions {
    /// Requested side multiplied by the scale (0 when no side was given).
    pub fn effective_side(&self) -> u32 {
        self.side.saturating_mul(self.scale.max(MIN_SCALE))
    }

    /// Byte budget, when one was requested.
    pub fn budget_bytes(&self) -> Option<u64> {
        (self.size_kb > 0).then(|| u64::from(self.size_kb) * 1024)
    }

    /// True when a side or a byte budget was supplied.
    ///
    /// A quality hint alone never triggers a transform.
    pub fn wants_derivative(&self) -> bool {
        self.side > 0 || self.size_kb > 0
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| n.min(u64::from(u32::MAX)) as u32),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64))
                .map(|n| n.min(u64::from(u32::MAX)) as u32)
        }
        _ => None,
    }
}

fn as_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Parse a quality hint.
///
/// `"high"` maps to 85, `"low"` to 40, other strings to 85. Numbers are capped
/// at 85; zero means unset.
pub fn parse_quality(value: &Value) -> Option<u8> {
    let numeric = match value {
        Value::Number(_) => as_u32(value),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => None,
            "high" => Some(u32::from(HIGH_QUALITY)),
            "low" => Some(u32::from(LOW_QUALITY)),
            _ => as_u32(value).or(Some(u32::from(HIGH_QUALITY))),
        },
        _ => None,
    }?;

    (numeric > 0).then(|| numeric.min(u32::from(MAX_QUALITY_HINT)) as u8)
}
