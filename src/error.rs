use thiserror::Error;

/// I/O errors that can occur when reading stored files or archive members
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// File, cache entry or archive member does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requested window exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// The zip container could not be read
    #[error("Archive error: {0}")]
    Archive(String),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Fs(String),
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(err.to_string()),
            _ => IoError::Fs(err.to_string()),
        }
    }
}

impl From<zip::result::ZipError> for IoError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::FileNotFound => {
                IoError::NotFound("archive member not found".to_string())
            }
            zip::result::ZipError::Io(io_err) => io_err.into(),
            other => IoError::Archive(other.to_string()),
        }
    }
}

/// Failures reported by the codec collaborators (image, gif, video, audio, epub)
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Source bytes could not be decoded
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Encoding the output failed
    #[error("Encode error: {message}")]
    Encode { message: String },

    /// An external tool could not be run or reported failure
    #[error("{tool} failed: {message}")]
    Tool { tool: &'static str, message: String },

    /// The container is not structured the way the extractor expects
    #[error("Malformed container: {0}")]
    Container(String),
}

/// Errors surfaced by the serving core.
///
/// Every variant is answered with HTTP 404; the variant only decides how the
/// failure is logged.
#[derive(Debug, Clone, Error)]
pub enum ServeError {
    /// Source file, cache artifact or archive member absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// The MIME type cannot be transformed the requested way
    #[error("Unsupported media type for this operation: {mime}")]
    Unsupported { mime: String },

    /// A codec collaborator failed
    #[error("Codec failure: {0}")]
    Codec(#[from] CodecError),

    /// The Range header could not be parsed or is not satisfiable
    #[error("Malformed range: {0}")]
    MalformedRange(String),

    /// Storage error while reading or writing
    #[error("I/O error: {0}")]
    Io(IoError),
}

impl From<IoError> for ServeError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::NotFound(what) => ServeError::NotFound(what),
            other => ServeError::Io(other),
        }
    }
}

impl From<std::io::Error> for ServeError {
    fn from(err: std::io::Error) -> Self {
        IoError::from(err).into()
    }
}
