// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

use crate::storage::StorageError;

/// Error type for Unitlab Client operations.
///
/// Platform errors are derived from the HTTP status of a response: 401 maps
/// to [`Error::AuthenticationError`], 403 to [`Error::SubscriptionError`], a
/// body mentioning "not found" to [`Error::NotFoundError`] and any other
/// failure status to [`Error::NetworkError`].  The remaining variants wrap
/// local failures (I/O, JSON, configuration) and invalid input.
#[derive(Debug)]
pub enum Error {
    /// Local file system failure.
    IoError(std::io::Error),
    /// Credential storage could not be read or written.
    StorageError(StorageError),
    /// A request or response body could not be (de)serialized.
    JsonError(serde_json::Error),
    /// Transport level error from the reqwest client.
    HttpError(reqwest::Error),
    /// URL parsing error.
    UrlParseError(url::ParseError),
    /// A spawned upload or download task panicked.
    JoinError(tokio::task::JoinError),
    /// The API key is missing or was rejected by the server (HTTP 401).
    AuthenticationError(String),
    /// The request was forbidden, usually a subscription limit (HTTP 403).
    SubscriptionError(String),
    /// The requested resource does not exist.
    NotFoundError(String),
    /// The server answered with a failure status.
    NetworkError(String),
    /// The request did not complete within the configured timeout.
    TimeoutError(String),
    /// The response parsed but lacked something the call needs.
    InvalidResponse,
    /// Caller input was rejected before any request was made.
    InvalidParameters(String),
    /// Not one of the `img_*` annotation type names.
    InvalidAnnotationType(String),
    /// The COCO annotation file is malformed or inconsistent.
    CocoError(String),
    /// A server provided file name resolves outside of the target folder.
    PathTraversal(String),
}

impl Error {
    /// Returns true for errors raised by the HTTP layer, including the
    /// refined not-found and subscription kinds.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Error::HttpError(_)
                | Error::NetworkError(_)
                | Error::NotFoundError(_)
                | Error::SubscriptionError(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::StorageError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::TimeoutError(err.to_string())
        } else {
            Error::HttpError(err)
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::UrlParseError(err)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::JoinError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::StorageError(e) => write!(f, "Credential storage error: {}", e),
            Error::JsonError(e) => write!(f, "JSON error: {}", e),
            Error::HttpError(e) => write!(f, "HTTP error: {}", e),
            Error::UrlParseError(e) => write!(f, "URL parse error: {}", e),
            Error::JoinError(e) => write!(f, "Task join error: {}", e),
            Error::AuthenticationError(s) => write!(f, "{}", s),
            Error::SubscriptionError(s) => write!(f, "{}", s),
            Error::NotFoundError(s) => write!(f, "Not found: {}", s),
            Error::NetworkError(s) => write!(f, "Network error: {}", s),
            Error::TimeoutError(s) => write!(f, "Request timed out: {}", s),
            Error::InvalidResponse => write!(f, "Invalid server response"),
            Error::InvalidParameters(s) => write!(f, "Invalid parameters: {}", s),
            Error::InvalidAnnotationType(s) => write!(f, "Invalid annotation type: {}", s),
            Error::CocoError(s) => write!(f, "COCO error: {}", s),
            Error::PathTraversal(s) => write!(f, "Path traversal detected: {}", s),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::StorageError(e) => Some(e),
            Error::JsonError(e) => Some(e),
            Error::HttpError(e) => Some(e),
            Error::UrlParseError(e) => Some(e),
            Error::JoinError(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_network() {
        assert!(Error::NetworkError("boom".to_string()).is_network());
        assert!(Error::NotFoundError("missing".to_string()).is_network());
        assert!(Error::SubscriptionError("limit".to_string()).is_network());
        assert!(!Error::AuthenticationError("no key".to_string()).is_network());
        assert!(!Error::TimeoutError("slow".to_string()).is_network());
        assert!(!Error::InvalidResponse.is_network());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::AuthenticationError("Authentication failed".to_string());
        assert_eq!(err.to_string(), "Authentication failed");

        let err = Error::PathTraversal("../etc/passwd".to_string());
        assert!(err.to_string().contains("../etc/passwd"));

        let err = Error::CocoError("Required key 'images' not found".to_string());
        assert!(err.to_string().starts_with("COCO error"));
    }

    #[test]
    fn test_io_error_source() {
        let err: Error = std::io::Error::other("disk full").into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
