//! Error types for blob scrubbing.

use std::path::PathBuf;
use std::str::Utf8Error;

use thiserror::Error;

/// Shared `Result` alias for the crate.
pub type Result<T> = std::result::Result<T, ScrubError>;

/// Everything that can go wrong while scrubbing a blob.
///
/// Decode failures are never recovered locally: the host rewriting process
/// is expected to abort or report the failing blob.
#[derive(Debug, Error)]
pub enum ScrubError {
    /// The metadata path could not be decoded as UTF-8.
    #[error("blob path is not valid UTF-8: {source}")]
    InvalidPath {
        #[source]
        source: Utf8Error,
    },

    /// A blob at the target path could not be decoded as UTF-8.
    #[error("blob content for {path} is not valid UTF-8: {source}")]
    InvalidContent {
        path: String,
        #[source]
        source: Utf8Error,
    },

    #[error("invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stream I/O failure: {0}")]
    Stream(#[from] std::io::Error),
}

impl ScrubError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScrubError::InvalidConfig {
            details: "marker must not be empty".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid configuration: marker must not be empty"
        );

        let err = ScrubError::io(
            "docker-compose.yml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.to_string(), "I/O failure at docker-compose.yml: gone");
    }

    #[test]
    fn test_invalid_content_keeps_source() {
        let source = std::str::from_utf8(&[0xff, 0xfe]).unwrap_err();
        let err = ScrubError::InvalidContent {
            path: "docker-compose.yml".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("blob content for docker-compose.yml"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
