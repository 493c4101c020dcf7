//! File service: the single entry point that answers a download request.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         FileService                             │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                serve_partial_or_full()                  │    │
//! │  │  1. Open file / zip member   4. Range → byte window     │    │
//! │  │  2. Sniff MIME               5. Member → whole stream   │    │
//! │  │  3. Cover → cover artifact   6. Plan, materialize, send │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                    │                    │           │
//! │           ▼                    ▼                    ▼           │
//! │    ┌─────────────┐    ┌─────────────────┐  ┌──────────────────┐ │
//! │    │ VirtualFile │    │ VariantResolver │  │ResponseAssembler │ │
//! │    └─────────────┘    └─────────────────┘  └──────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use tracing::{debug, error, warn};

use crate::codec::{mime, MediaCodecs};
use crate::config::{StoreConfig, DEFAULT_CACHE_MAX_AGE};
use crate::error::ServeError;
use crate::io::{LocalFileReader, RangeReader, VirtualFile, ZipMemberReader};
use crate::variant::{
    artifact_exists, CacheLayout, Plan, Resolved, ServeOptions, VariantResolver, IMPORT_NAMESPACE,
};

use super::range::parse_range_header;
use super::response::{BodySource, EntityMeta, ResponseAssembler};

// =============================================================================
// Serve Request
// =============================================================================

/// The parts of an HTTP request the core looks at.
#[derive(Debug, Clone, Default)]
pub struct ServeRequest {
    /// Raw `Range` header value
    pub range: Option<String>,

    /// Normalized parameters
    pub options: ServeOptions,

    /// The file was located under the import root
    pub from_import: bool,
}

impl ServeRequest {
    pub fn new(options: ServeOptions) -> Self {
        Self {
            range: None,
            options,
            from_import: false,
        }
    }

    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }
}

// =============================================================================
// File Service
// =============================================================================

/// Resolves, caches and streams stored files.
///
/// # Type Parameters
///
/// * `C` - The codec collaborators (e.g., [`crate::codec::SystemCodecs`])
pub struct FileService<C: MediaCodecs> {
    config: StoreConfig,
    resolver: VariantResolver<C>,
    import_resolver: Option<VariantResolver<C>>,
    assembler: ResponseAssembler,
}

impl<C: MediaCodecs> FileService<C> {
    /// Create a service with the default Cache-Control max-age.
    pub fn new(config: StoreConfig, codecs: C) -> Self {
        Self::with_cache_max_age(config, Arc::new(codecs), DEFAULT_CACHE_MAX_AGE)
    }

    /// Create a service sharing `codecs` with custom Cache-Control max-age.
    pub fn with_cache_max_age(config: StoreConfig, codecs: Arc<C>, cache_max_age: u32) -> Self {
        let layout = CacheLayout::new(config.cache_root.clone());
        let import_resolver = config.import_root.as_ref().map(|_| {
            VariantResolver::new(
                Arc::clone(&codecs),
                layout.clone().with_namespace(IMPORT_NAMESPACE),
            )
        });
        Self {
            resolver: VariantResolver::new(codecs, layout),
            import_resolver,
            assembler: ResponseAssembler::new(config.chunk_size, cache_max_age),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Resolver whose cache namespace matches the file's root.
    ///
    /// Without an import root both routes read the store, so they share it.
    pub fn resolver(&self, from_import: bool) -> &VariantResolver<C> {
        match (&self.import_resolver, from_import) {
            (Some(resolver), true) => resolver,
            _ => &self.resolver,
        }
    }

    /// Locate a stored file by name.
    ///
    /// Names containing path separators or `..` never resolve.
    pub fn locate(&self, filename: &str, at_import: bool) -> Result<PathBuf, ServeError> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
        {
            return Err(ServeError::NotFound(format!("invalid file name: {}", filename)));
        }
        Ok(self.config.root_for(at_import).join(filename))
    }

    /// Answer a download request.
    ///
    /// Never fails: every error becomes a 404 response.
    pub async fn serve_partial_or_full(
        &self,
        request: &ServeRequest,
        file_path: &Path,
        archive_sub_path: Option<&str>,
        logical_filename: &str,
    ) -> Response {
        match self
            .try_serve(request, file_path, archive_sub_path, logical_filename)
            .await
        {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    async fn try_serve(
        &self,
        request: &ServeRequest,
        file_path: &Path,
        archive_sub_path: Option<&str>,
        logical_filename: &str,
    ) -> Result<Response, ServeError> {
        let options = &request.options;
        let resolver = self.resolver(request.from_import);
        let file = VirtualFile::open(file_path, archive_sub_path).await?;

        let entity_name = file.display_name().unwrap_or(logical_filename);
        let head = file.head().await?;
        let source_mime = mime::sniff_mime(&head, Some(entity_name), options.mime_hint.as_deref());
        let filename = match &options.name {
            Some(name) => download_name(name, &source_mime, options.mime_hint.as_deref()),
            None => entity_name.to_string(),
        };

        debug!(
            file = %file.identifier(),
            mime = %source_mime,
            cover = options.cover,
            range = ?request.range,
            "Serving file"
        );

        match file {
            VirtualFile::Plain(reader) => {
                if options.cover {
                    self.serve_cover(resolver, &reader, logical_filename, &source_mime, filename, options)
                        .await
                } else if let Some(range) = &request.range {
                    self.serve_range(
                        resolver,
                        &reader,
                        logical_filename,
                        &source_mime,
                        range,
                        filename,
                        options,
                    )
                    .await
                } else {
                    self.serve_plain(resolver, &reader, logical_filename, &source_mime, filename, options)
                        .await
                }
            }
            VirtualFile::ZipMember(member) => {
                if options.cover {
                    return Err(ServeError::Unsupported { mime: source_mime });
                }
                let meta = EntityMeta {
                    mime: source_mime,
                    filename,
                    cache_hit: None,
                };
                match &request.range {
                    Some(range) => self.serve_member_range(&member, range, &meta).await,
                    None => {
                        let source = BodySource::Reader {
                            reader: Box::new(member.stream(self.assembler.chunk_size())),
                            length: member.size(),
                        };
                        self.assembler.full(source, &meta).await
                    }
                }
            }
        }
    }

    async fn serve_plain(
        &self,
        resolver: &VariantResolver<C>,
        reader: &LocalFileReader,
        source_name: &str,
        source_mime: &str,
        filename: String,
        options: &ServeOptions,
    ) -> Result<Response, ServeError> {
        let plan = resolver
            .plan(reader.path(), reader.size(), source_mime, options)
            .await;

        let resolved = match resolver
            .materialize(reader.path(), source_name, &plan)
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                match &e {
                    ServeError::Codec(_) => {
                        error!(file = %source_name, error = %e, "Derivation failed, serving original")
                    }
                    _ => warn!(file = %source_name, error = %e, "Derivation failed, serving original"),
                }
                Resolved::Original
            }
        };

        self.respond(resolved, reader, source_mime, filename).await
    }

    async fn serve_cover(
        &self,
        resolver: &VariantResolver<C>,
        reader: &LocalFileReader,
        source_name: &str,
        source_mime: &str,
        filename: String,
        options: &ServeOptions,
    ) -> Result<Response, ServeError> {
        let resolved = resolver
            .resolve_cover(reader.path(), source_name, reader.size(), source_mime, options)
            .await?;
        self.respond(resolved, reader, source_mime, filename).await
    }

    /// Ranged request against a stored file.
    ///
    /// Never triggers a transform: a derived artifact is used only if it is
    /// already cached, otherwise the stored bytes are ranged.
    async fn serve_range(
        &self,
        resolver: &VariantResolver<C>,
        reader: &LocalFileReader,
        source_name: &str,
        source_mime: &str,
        range_header: &str,
        filename: String,
        options: &ServeOptions,
    ) -> Result<Response, ServeError> {
        let plan = resolver
            .plan(reader.path(), reader.size(), source_mime, options)
            .await;

        let mut cached = None;
        if let Plan::Derived { derivation, transform, .. } = &plan {
            let path = resolver.layout().path_for(source_name, transform);
            if artifact_exists(&path).await {
                cached = Some((LocalFileReader::open(&path).await?, derivation.output_mime()));
            }
        }

        let (target, meta) = match cached {
            Some((artifact, mime)) => (
                artifact,
                EntityMeta {
                    mime: mime.to_string(),
                    filename,
                    cache_hit: Some(true),
                },
            ),
            None => (
                reader.clone(),
                EntityMeta {
                    mime: source_mime.to_string(),
                    filename,
                    cache_hit: None,
                },
            ),
        };

        let total = target.size();
        let range = parse_range_header(range_header, total)?;
        let window = target.open_window(range.start, range.length).await?;
        let source = BodySource::Reader {
            reader: Box::new(window),
            length: range.length,
        };
        self.assembler.partial(source, range, total, &meta).await
    }

    async fn serve_member_range(
        &self,
        member: &ZipMemberReader,
        range_header: &str,
        meta: &EntityMeta,
    ) -> Result<Response, ServeError> {
        let total = member.size();
        let range = parse_range_header(range_header, total)?;
        let len = usize::try_from(range.length)
            .map_err(|_| ServeError::MalformedRange(format!("{} bytes is too large", range.length)))?;
        let data = member.read_exact_at(range.start, len).await?;
        self.assembler
            .partial(BodySource::Bytes(data), range, total, meta)
            .await
    }

    async fn respond(
        &self,
        resolved: Resolved,
        reader: &LocalFileReader,
        source_mime: &str,
        filename: String,
    ) -> Result<Response, ServeError> {
        let (source, meta) = match resolved {
            Resolved::Original => (
                BodySource::Path(reader.path().to_path_buf()),
                EntityMeta {
                    mime: source_mime.to_string(),
                    filename,
                    cache_hit: None,
                },
            ),
            Resolved::Artifact {
                path,
                mime,
                cache_hit,
            } => (
                BodySource::Path(path),
                EntityMeta {
                    mime: mime.to_string(),
                    filename,
                    cache_hit: Some(cache_hit),
                },
            ),
            Resolved::Inline { data, mime } => (
                BodySource::Bytes(data),
                EntityMeta {
                    mime,
                    filename,
                    cache_hit: None,
                },
            ),
        };
        self.assembler.full(source, &meta).await
    }
}

/// Download name for a `name` override, given an extension when it has none.
fn download_name(name: &str, source_mime: &str, hint: Option<&str>) -> String {
    if Path::new(name).extension().is_some() {
        return name.to_string();
    }
    format!("{}{}", name, mime::guess_extension(name, source_mime, hint))
}
