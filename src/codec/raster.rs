//! Raster image codec built on the `image` crate.
//!
//! # Design Decisions
//!
//! - **Orientation first**: decoding applies the EXIF orientation so every
//!   derived artifact is stored upright.
//!
//! - **Downscale only**: resizing fits the image inside the requested box and
//!   never enlarges it.
//!
//! - **Two output formats**: JPEG whenever a quality value matters, PNG for
//!   plain thumbnails of non-JPEG sources (keeps transparency).

use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};

use crate::error::CodecError;

/// Default JPEG quality for plain thumbnails (1-100).
pub const DEFAULT_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_QUALITY: u8 = 100;

/// Bounding box for extracted video and epub cover frames.
pub const COVER_SIDE: u32 = 1920;

/// JPEG quality for extracted cover frames.
pub const COVER_QUALITY: u8 = 70;

/// Encoding used for a derived image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Pick the output format for a source MIME type.
    ///
    /// `quality_bound` is true when the artifact is defined by a quality value
    /// or a byte budget, which only JPEG can honor.
    pub fn for_source(source_mime: &str, quality_bound: bool) -> Self {
        if quality_bound || source_mime == "image/jpeg" {
            OutputFormat::Jpeg
        } else {
            OutputFormat::Png
        }
    }

    /// MIME type of the encoded output.
    pub fn mime(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    /// Short name used in cache descriptors.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

fn decode_error(e: impl std::fmt::Display) -> CodecError {
    CodecError::Decode {
        message: e.to_string(),
    }
}

fn encode_error(e: impl std::fmt::Display) -> CodecError {
    CodecError::Encode {
        message: e.to_string(),
    }
}

/// Decode image bytes and apply the EXIF orientation.
pub fn decode_oriented(data: &[u8]) -> Result<DynamicImage, CodecError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(decode_error)?;
    let mut decoder = reader.into_decoder().map_err(decode_error)?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Read image dimensions from the file header.
///
/// Returns `(width, height)` in pixels as stored, before orientation.
pub fn image_dimensions(path: &Path) -> Result<(u32, u32), CodecError> {
    ImageReader::open(path)
        .map_err(decode_error)?
        .with_guessed_format()
        .map_err(decode_error)?
        .into_dimensions()
        .map_err(decode_error)
}

/// Encode an image without resizing.
pub fn encode(image: &DynamicImage, quality: u8, format: OutputFormat) -> Result<Bytes, CodecError> {
    let mut output = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let encodable = match image {
                DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => Cow::Borrowed(image),
                other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
            };
            let encoder = JpegEncoder::new_with_quality(&mut output, clamp_quality(quality));
            encodable
                .write_with_encoder(encoder)
                .map_err(encode_error)?;
        }
        OutputFormat::Png => {
            image
                .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
                .map_err(encode_error)?;
        }
    }
    Ok(Bytes::from(output))
}

/// Downscale to fit `max_width × max_height`, preserving aspect ratio, then encode.
///
/// Images already inside the box are encoded at their own size.
pub fn resize_encode(
    image: &DynamicImage,
    max_width: u32,
    max_height: u32,
    quality: u8,
    format: OutputFormat,
) -> Result<Bytes, CodecError> {
    let max_width = max_width.max(1);
    let max_height = max_height.max(1);

    if image.width() > max_width || image.height() > max_height {
        let resized = image.resize(max_width, max_height, FilterType::Lanczos3);
        encode(&resized, quality, format)
    } else {
        encode(image, quality, format)
    }
}

/// Clamp quality to valid range.
///
/// Values below 1 become 1, values above 100 become 100.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_QUALITY, MAX_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
