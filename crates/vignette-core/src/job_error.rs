//! Job execution error types
//!
//! A deferred thumbnail job either succeeds, fails in a way that another attempt may
//! fix (repository contention, engine timeout), or fails for good (content the
//! converters cannot read). The queue uses this distinction to decide on retries.

use std::fmt;

use crate::error::ThumbnailError;

/// Job execution error that is either retryable or final.
#[derive(Debug)]
pub struct JobError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl JobError {
    /// The job fails immediately, without further attempts.
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    /// The job is retried according to the queue's retry policy.
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<ThumbnailError> for JobError {
    fn from(err: ThumbnailError) -> Self {
        let recoverable = err.is_recoverable();
        Self {
            inner: err.into(),
            recoverable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConversionError, RepositoryError};

    #[test]
    fn test_explicit_constructors() {
        let retried = JobError::recoverable(anyhow::anyhow!("connection reset"));
        assert!(retried.is_recoverable());
        assert_eq!(retried.to_string(), "connection reset");

        let fatal = JobError::unrecoverable(anyhow::anyhow!("no handler"));
        assert!(!fatal.is_recoverable());
    }

    #[test]
    fn test_conversion_failure_is_final() {
        let err: JobError =
            ThumbnailError::conversion("/files/a.docx", ConversionError::EmptySource).into();
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("/files/a.docx"));
    }

    #[test]
    fn test_repository_failure_is_retried() {
        let err: JobError = ThumbnailError::repository(
            "/files/a.docx",
            RepositoryError::CheckoutFailed("locked by another session".to_string()),
        )
        .into();
        assert!(err.is_recoverable());
    }
}
