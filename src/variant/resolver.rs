//! Variant resolution.
//!
//! The resolver decides which artifact answers a request and produces it on a
//! cache miss.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      VariantResolver                         │
//! │                                                              │
//! │   plan()         side/size/quality + MIME ──► Plan           │
//! │   materialize()  Plan ──► cached path (hit) or codec run     │
//! │   resolve_cover() audio / video / epub / image dispatch      │
//! │                                                              │
//! │        │                     │                      │        │
//! │        ▼                     ▼                      ▼        │
//! │  ┌────────────┐     ┌──────────────────┐    ┌─────────────┐  │
//! │  │CacheLayout │     │ QualityTargeter  │    │ MediaCodecs │  │
//! │  └────────────┘     └──────────────────┘    └─────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cache misses are not coalesced. Two requests missing the same descriptor
//! both compute it; the atomic rename makes the last writer win with identical
//! bytes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::codec::{
    mime, GifParams, MediaCodecs, OutputFormat, COVER_QUALITY, COVER_SIDE, DEFAULT_QUALITY,
};
use crate::error::{CodecError, IoError, ServeError};

use super::naming::{artifact_exists, persist_temp, temp_beside, write_atomic, CacheLayout, Transform};
use super::options::{ServeOptions, MAX_QUALITY_HINT};
use super::quality::QualityTargeter;

/// Palette size for plain gif thumbnails.
pub const GIF_COLORS: u16 = 256;

/// Palette size for gifs under a byte budget.
pub const GIF_BUDGET_COLORS: u16 = 128;

/// Lossy level for gifs without a quality hint.
pub const GIF_DEFAULT_LOSSY: u16 = 20;

/// Lossy level for gifs under a byte budget.
pub const GIF_BUDGET_LOSSY: u16 = 80;

/// gifsicle optimization level.
pub const GIF_OPTIMIZE: u8 = 3;

/// How a derived artifact is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// Decode, downscale, encode once
    Resize { quality: u8, format: OutputFormat },

    /// Decode, downscale, then search the quality that fits `max_bytes`
    Budget { max_bytes: u64 },

    /// Run gifsicle
    Gif(GifParams),
}

impl Derivation {
    /// MIME type of the produced artifact.
    pub fn output_mime(&self) -> &'static str {
        match self {
            Derivation::Resize { format, .. } => format.mime(),
            Derivation::Budget { .. } => OutputFormat::Jpeg.mime(),
            Derivation::Gif(_) => "image/gif",
        }
    }
}

/// What a plain request resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Serve the stored bytes unchanged
    Original,

    /// Serve (and on a miss, produce) a derived artifact
    Derived {
        transform: Transform,
        derivation: Derivation,
        side: u32,
    },
}

/// A resolved body ready for the response assembler.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// The stored file itself
    Original,

    /// A file under the cache root
    Artifact {
        path: PathBuf,
        mime: &'static str,
        cache_hit: bool,
    },

    /// Bytes produced on the fly and not cached
    Inline { data: Bytes, mime: String },
}

/// Decides and produces derived artifacts.
pub struct VariantResolver<C> {
    codecs: Arc<C>,
    layout: CacheLayout,
}

impl<C> Clone for VariantResolver<C> {
    fn clone(&self) -> Self {
        Self {
            codecs: Arc::clone(&self.codecs),
            layout: self.layout.clone(),
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T, ServeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CodecError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServeError::Io(IoError::Fs(format!("blocking task failed: {}", e))))?
        .map_err(ServeError::from)
}

/// Bounding side for a request: the requested side, or the image's own
/// longest side when none was given or the request would upscale.
pub fn target_side(requested: u32, width: u32, height: u32) -> u32 {
    let longest = width.max(height);
    if requested == 0 || (requested >= width && requested >= height) {
        longest
    } else {
        requested
    }
}

/// gifsicle lossy level for a quality hint.
pub fn gif_lossy(quality: Option<u8>) -> u16 {
    match quality {
        Some(q) => u16::from(MAX_QUALITY_HINT.saturating_sub(q)) * 2,
        None => GIF_DEFAULT_LOSSY,
    }
}

impl<C: MediaCodecs> VariantResolver<C> {
    pub fn new(codecs: Arc<C>, layout: CacheLayout) -> Self {
        Self { codecs, layout }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Decide how a plain request for `source_path` is answered.
    ///
    /// Only compressible images with a side or a byte budget are derived. When
    /// the stored file already fits the budget it is served as is. Images whose
    /// header cannot be read fall back to the original.
    pub async fn plan(
        &self,
        source_path: &Path,
        source_size: u64,
        source_mime: &str,
        options: &ServeOptions,
    ) -> Plan {
        if !options.wants_derivative() || mime::compressible_format(source_mime).is_none() {
            return Plan::Original;
        }

        if let Some(max_bytes) = options.budget_bytes() {
            if source_size <= max_bytes {
                debug!(
                    path = %source_path.display(),
                    size = source_size,
                    max_bytes,
                    "Source already within budget"
                );
                return Plan::Original;
            }
        }

        let codecs = Arc::clone(&self.codecs);
        let path = source_path.to_path_buf();
        let (width, height) = match blocking(move || codecs.image_dimensions(&path)).await {
            Ok(dims) => dims,
            Err(e) => {
                warn!(path = %source_path.display(), error = %e, "Cannot read image header, serving original");
                return Plan::Original;
            }
        };

        let side = target_side(options.effective_side(), width, height);
        let budget_kb = (options.size_kb > 0).then_some(options.size_kb);

        if mime::is_gif(source_mime) {
            let params = match budget_kb {
                Some(_) => GifParams {
                    width: side,
                    height: side,
                    colors: GIF_BUDGET_COLORS,
                    lossy: GIF_BUDGET_LOSSY,
                    optimize: GIF_OPTIMIZE,
                },
                None => GifParams {
                    width: side,
                    height: side,
                    colors: GIF_COLORS,
                    lossy: gif_lossy(options.quality),
                    optimize: GIF_OPTIMIZE,
                },
            };
            return Plan::Derived {
                transform: Transform::GifThumbnail {
                    width: side,
                    height: side,
                    colors: params.colors,
                    lossy: params.lossy,
                    optimize: params.optimize,
                    budget_kb,
                },
                derivation: Derivation::Gif(params),
                side,
            };
        }

        if let (Some(kb), Some(max_bytes)) = (budget_kb, options.budget_bytes()) {
            return Plan::Derived {
                transform: Transform::CompressCacheThumbnail {
                    width: side,
                    height: side,
                    budget_kb: kb,
                },
                derivation: Derivation::Budget { max_bytes },
                side,
            };
        }

        match options.quality {
            Some(quality) => Plan::Derived {
                transform: Transform::QualityThumbnail {
                    width: side,
                    height: side,
                    quality,
                },
                derivation: Derivation::Resize {
                    quality,
                    format: OutputFormat::Jpeg,
                },
                side,
            },
            None => {
                let format = OutputFormat::for_source(source_mime, false);
                Plan::Derived {
                    transform: Transform::Thumbnail {
                        width: side,
                        height: side,
                        format,
                    },
                    derivation: Derivation::Resize {
                        quality: DEFAULT_QUALITY,
                        format,
                    },
                    side,
                }
            }
        }
    }

    /// Cache path of a planned artifact, if the plan derives one.
    pub fn cached_path(&self, source_name: &str, plan: &Plan) -> Option<PathBuf> {
        match plan {
            Plan::Original => None,
            Plan::Derived { transform, .. } => Some(self.layout.path_for(source_name, transform)),
        }
    }

    /// Return the artifact for `plan`, producing it on a miss.
    pub async fn materialize(
        &self,
        source_path: &Path,
        source_name: &str,
        plan: &Plan,
    ) -> Result<Resolved, ServeError> {
        let (transform, derivation, side) = match plan {
            Plan::Original => return Ok(Resolved::Original),
            Plan::Derived {
                transform,
                derivation,
                side,
            } => (transform, *derivation, *side),
        };

        let path = self.layout.path_for(source_name, transform);
        let descriptor = transform.descriptor();
        let mime = derivation.output_mime();

        if artifact_exists(&path).await {
            debug!(descriptor = %descriptor, "Cache hit");
            return Ok(Resolved::Artifact {
                path,
                mime,
                cache_hit: true,
            });
        }
        debug!(descriptor = %descriptor, "Cache miss");

        match derivation {
            Derivation::Gif(params) => {
                let tmp = temp_beside(&path).await?;
                self.codecs.gif_compress(source_path, &tmp, &params).await?;
                persist_temp(tmp, &path).await?;
            }
            Derivation::Resize { quality, format } => {
                let data = tokio::fs::read(source_path).await?;
                let codecs = Arc::clone(&self.codecs);
                let encoded = blocking(move || {
                    let image = codecs.decode_image(&data)?;
                    codecs.resize_encode(&image, side, side, quality, format)
                })
                .await?;
                write_atomic(&path, encoded).await?;
            }
            Derivation::Budget { max_bytes } => {
                let data = tokio::fs::read(source_path).await?;
                let codecs = Arc::clone(&self.codecs);
                let targeted = blocking(move || {
                    let image = codecs.decode_image(&data)?;
                    QualityTargeter::new(max_bytes).search(|quality| {
                        codecs.resize_encode(&image, side, side, quality, OutputFormat::Jpeg)
                    })
                })
                .await?;
                if !targeted.within_budget {
                    warn!(
                        descriptor = %descriptor,
                        size = targeted.data.len(),
                        max_bytes,
                        "Minimum quality still over budget"
                    );
                }
                write_atomic(&path, targeted.data).await?;
            }
        }

        Ok(Resolved::Artifact {
            path,
            mime,
            cache_hit: false,
        })
    }

    /// Resolve a `cover` request by the container's MIME type.
    ///
    /// Images go through the plain derivation path; video and epub covers are
    /// cached as bounded JPEGs; audio cover art is returned as embedded.
    pub async fn resolve_cover(
        &self,
        source_path: &Path,
        source_name: &str,
        source_size: u64,
        source_mime: &str,
        options: &ServeOptions,
    ) -> Result<Resolved, ServeError> {
        if mime::is_image(source_mime) {
            let plan = self.plan(source_path, source_size, source_mime, options).await;
            return self.materialize(source_path, source_name, &plan).await;
        }

        if mime::is_video(source_mime) {
            let transform = Transform::VideoCover {
                width: COVER_SIDE,
                height: COVER_SIDE,
                quality: COVER_QUALITY,
            };
            return self
                .cached_cover(source_name, transform, || async {
                    match self.codecs.video_cover_frame(source_path).await? {
                        Some(frame) => {
                            let codecs = Arc::clone(&self.codecs);
                            blocking(move || {
                                codecs.resize_encode(
                                    &frame,
                                    COVER_SIDE,
                                    COVER_SIDE,
                                    COVER_QUALITY,
                                    OutputFormat::Jpeg,
                                )
                            })
                            .await
                            .map(Some)
                        }
                        None => Ok(None),
                    }
                })
                .await;
        }

        if mime::is_epub(source_mime) {
            let transform = Transform::EpubCover {
                width: COVER_SIDE,
                height: COVER_SIDE,
                quality: COVER_QUALITY,
            };
            return self
                .cached_cover(source_name, transform, || async {
                    match self.codecs.epub_cover(source_path).await? {
                        Some(data) => {
                            let codecs = Arc::clone(&self.codecs);
                            blocking(move || {
                                let image = codecs.decode_image(&data)?;
                                codecs.resize_encode(
                                    &image,
                                    COVER_SIDE,
                                    COVER_SIDE,
                                    COVER_QUALITY,
                                    OutputFormat::Jpeg,
                                )
                            })
                            .await
                            .map(Some)
                        }
                        None => Ok(None),
                    }
                })
                .await;
        }

        if mime::is_audio(source_mime) {
            return match self.codecs.audio_cover_art(source_path).await? {
                Some(data) => {
                    let mime = mime::sniff_mime(&data, None, Some("image/png"));
                    Ok(Resolved::Inline { data, mime })
                }
                None => Err(ServeError::NotFound(format!(
                    "no cover art in {}",
                    source_name
                ))),
            };
        }

        Err(ServeError::Unsupported {
            mime: source_mime.to_string(),
        })
    }

    async fn cached_cover<F, Fut>(
        &self,
        source_name: &str,
        transform: Transform,
        produce: F,
    ) -> Result<Resolved, ServeError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Option<Bytes>, ServeError>>,
    {
        let path = self.layout.path_for(source_name, &transform);
        let mime = OutputFormat::Jpeg.mime();

        if artifact_exists(&path).await {
            debug!(descriptor = %transform, "Cover cache hit");
            return Ok(Resolved::Artifact {
                path,
                mime,
                cache_hit: true,
            });
        }

        match produce().await? {
            Some(encoded) => {
                write_atomic(&path, encoded).await?;
                Ok(Resolved::Artifact {
                    path,
                    mime,
                    cache_hit: false,
                })
            }
            None => Err(ServeError::NotFound(format!(
                "no cover in {}",
                source_name
            ))),
        }
    }
}
