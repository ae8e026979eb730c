//! Error types for Orlova.
//!
//! Cancellation is not an error here: a cancelled download or pull resolves to
//! an outcome with `success == false`. Everything else that can go wrong is
//! reported through [`OrlovaError`].

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Orlova core library.
#[derive(Debug, Error)]
pub enum OrlovaError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// The registry (or the local daemon) answered with a non-success status.
    #[error("{service} returned {status}: {body}")]
    Registry {
        service: String,
        status: u16,
        body: String,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Download errors
    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("Pull failed for {model}: {message}")]
    PullFailed { model: String, message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Orlova operations.
pub type Result<T> = std::result::Result<T, OrlovaError>;

impl From<std::io::Error> for OrlovaError {
    fn from(err: std::io::Error) -> Self {
        OrlovaError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for OrlovaError {
    fn from(err: serde_json::Error) -> Self {
        OrlovaError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for OrlovaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OrlovaError::Timeout(crate::config::NetworkConfig::REQUEST_TIMEOUT)
        } else {
            OrlovaError::Network {
                message: err.to_string(),
                cause: err.url().map(|u| u.to_string()),
            }
        }
    }
}

impl OrlovaError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        OrlovaError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Build a [`OrlovaError::Registry`] from a status and a response body.
    ///
    /// The body is truncated to `max_body_chars` characters so a large HTML
    /// error page does not end up in a log line.
    pub fn registry(service: &str, status: u16, body: &str, max_body_chars: usize) -> Self {
        OrlovaError::Registry {
            service: service.to_string(),
            status,
            body: body.chars().take(max_body_chars).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrlovaError::Validation {
            field: "limit".into(),
            message: "must be positive".into(),
        };
        assert_eq!(err.to_string(), "Validation error for limit: must be positive");
    }

    #[test]
    fn test_registry_error_truncates_body() {
        let body = "x".repeat(500);
        let err = OrlovaError::registry("HF API", 503, &body, 200);
        match &err {
            OrlovaError::Registry { status, body, .. } => {
                assert_eq!(*status, 503);
                assert_eq!(body.len(), 200);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("HF API returned 503: "));
    }

    #[test]
    fn test_io_with_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = OrlovaError::io_with_path(io, "/tmp/missing");
        assert!(matches!(err, OrlovaError::Io { path: Some(_), .. }));
    }
}
