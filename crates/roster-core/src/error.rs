//! Error types for roster-core

use crate::StatusCode;
use thiserror::Error;

/// Result type alias for roster operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the roster HTTP server
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP method token that cannot be routed
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// No route is registered at the path
    #[error("No route for {0}")]
    NotFound(String),

    /// Invalid path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Bind address that does not parse as a socket address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid header name or value
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Payload serialization failed
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Status code a client sees when this error ends a request
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Error::InvalidHeader(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::InvalidMethod("BREW".into()).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            Error::NotFound("/unknown".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::InvalidPath("members".into()).status(),
            StatusCode::BAD_REQUEST
        );
        // Headers are only ever built by the server itself
        assert_eq!(
            Error::InvalidHeader("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display() {
        let err = Error::InvalidMethod("BREW".into());
        assert_eq!(err.to_string(), "Invalid HTTP method: BREW");
    }
}
