// shared/src/lib.rs

use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not found")]
    NotFound,
    #[error("{backend} unavailable: {message}")]
    Unavailable {
        backend: &'static str,
        message: String,
    },
    #[error("{backend}: {source}")]
    Backend {
        backend: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("{backend} call timed out after {after:?}")]
    Timeout {
        backend: &'static str,
        after: Duration,
    },
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("document is {length} bytes, maximum is {max}")]
    TooLarge { length: usize, max: usize },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// Wraps a driver error, keeping it as the source.
    pub fn backend(backend: &'static str, err: impl Into<BoxError>) -> Self {
        Error::Backend {
            backend,
            source: err.into(),
        }
    }

    pub fn unavailable(backend: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Unavailable {
            backend,
            message: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod config;
pub mod expiration;

pub use expiration::ExpirationWindow;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::backend("file", io);

        assert_eq!(err.to_string(), "file: denied");
        let source = std::error::Error::source(&err).expect("source kept");
        assert_eq!(source.to_string(), "denied");
    }

    #[test]
    fn test_not_found_predicate() {
        assert!(Error::NotFound.is_not_found());
        assert!(!Error::Internal("x".into()).is_not_found());
    }
}
