//! Error types module
//!
//! Failures of the thumbnail pipeline fall into three groups:
//!
//! - [`ConversionError`]: an external engine (document converter, PDF renderer, frame
//!   extractor) failed or produced no usable output.
//! - [`RepositoryError`]: the content repository could not be read or written.
//! - Anything else, reported as [`ThumbnailError::Unexpected`].
//!
//! An item that simply cannot produce a thumbnail (service disabled, unsupported format)
//! is not an error at all; callers get `Ok(false)` instead.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like invalid requests
    Debug,
    /// Warning level - for failures that only cost us a thumbnail
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Failure of one of the external conversion engines.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Conversion engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Source content is empty")]
    EmptySource,

    #[error("Source content is not decodable: {0}")]
    InvalidSource(String),

    #[error("Page index {page_index} out of range, document has {page_count} page(s)")]
    PageOutOfRange { page_index: u32, page_count: u32 },

    #[error("Invalid time offset: {0} seconds")]
    InvalidOffset(i64),

    #[error("Conversion produced no output: {0}")]
    NoOutput(String),

    #[error("{engine} failed: {message}")]
    EngineFailed {
        engine: &'static str,
        message: String,
    },

    #[error("{engine} timed out after {seconds} seconds")]
    Timeout { engine: &'static str, seconds: u64 },

    #[error("Image decoding failed: {0}")]
    Decode(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ConversionError {
    pub fn engine_failed(engine: &'static str, message: impl Into<String>) -> Self {
        ConversionError::EngineFailed {
            engine,
            message: message.into(),
        }
    }
}

/// Repository operation errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Checkout failed: {0}")]
    CheckoutFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid item path: {0}")]
    InvalidPath(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Metadata(err.to_string())
    }
}

/// Error returned by thumbnail generation. Every variant that concerns an item carries
/// the item path for diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("Thumbnail conversion failed for {path}: {source}")]
    Conversion {
        path: String,
        #[source]
        source: ConversionError,
    },

    #[error("Repository operation failed for {path}: {source}")]
    Repository {
        path: String,
        #[source]
        source: RepositoryError,
    },

    #[error("Unexpected error generating thumbnail for {path}: {source}")]
    Unexpected {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid thumbnail request: {0}")]
    InvalidRequest(String),
}

impl ThumbnailError {
    pub fn conversion(path: impl Into<String>, source: impl Into<ConversionError>) -> Self {
        ThumbnailError::Conversion {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn repository(path: impl Into<String>, source: RepositoryError) -> Self {
        ThumbnailError::Repository {
            path: path.into(),
            source,
        }
    }

    pub fn unexpected(path: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        ThumbnailError::Unexpected {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Item path the error refers to, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            ThumbnailError::Conversion { path, .. }
            | ThumbnailError::Repository { path, .. }
            | ThumbnailError::Unexpected { path, .. } => Some(path),
            ThumbnailError::InvalidRequest(_) => None,
        }
    }

    /// Whether running the same request again may succeed.
    ///
    /// Conversion failures are deterministic for a given content stream; repository
    /// failures are usually transactional and worth another attempt.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ThumbnailError::Conversion { source, .. } => {
                matches!(source, ConversionError::Timeout { .. } | ConversionError::Io(_))
            }
            ThumbnailError::Repository { source, .. } => {
                !matches!(source, RepositoryError::NotFound(_) | RepositoryError::InvalidPath(_))
            }
            ThumbnailError::Unexpected { .. } => true,
            ThumbnailError::InvalidRequest(_) => false,
        }
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            ThumbnailError::Conversion { .. } => LogLevel::Warn,
            ThumbnailError::Repository { .. } | ThumbnailError::Unexpected { .. } => {
                LogLevel::Error
            }
            ThumbnailError::InvalidRequest(_) => LogLevel::Debug,
        }
    }

    pub fn is_repository(&self) -> bool {
        matches!(self, ThumbnailError::Repository { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_error_carries_path() {
        let err = ThumbnailError::conversion("/files/report.docx", ConversionError::EmptySource);
        assert_eq!(err.path(), Some("/files/report.docx"));
        assert!(err.to_string().contains("/files/report.docx"));
        assert!(!err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_timeout_is_recoverable() {
        let err = ThumbnailError::conversion(
            "/files/big.pptx",
            ConversionError::Timeout {
                engine: "soffice",
                seconds: 120,
            },
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_repository_error_classification() {
        let write = ThumbnailError::repository(
            "/files/a.pdf",
            RepositoryError::WriteFailed("locked".to_string()),
        );
        assert!(write.is_repository());
        assert!(write.is_recoverable());
        assert_eq!(write.log_level(), LogLevel::Error);

        let missing =
            ThumbnailError::repository("/files/a.pdf", RepositoryError::NotFound("a".to_string()));
        assert!(!missing.is_recoverable());
    }

    #[test]
    fn test_io_converts_into_conversion_error() {
        let io_err = io::Error::new(io::ErrorKind::Other, "disk full");
        let err = ThumbnailError::conversion("/files/a.doc", io_err);
        assert!(matches!(
            err,
            ThumbnailError::Conversion {
                source: ConversionError::Io(_),
                ..
            }
        ));
    }
}
