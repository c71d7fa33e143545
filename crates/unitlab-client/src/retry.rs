// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

//! Retry policies with URL-based classification for the Unitlab Client.
//!
//! Requests fall into two categories:
//!
//! - **Api**: calls to the configured Unitlab API host under `/api/`
//! - **FileIO**: everything else, typically dataset sources and exported
//!   annotation files served from object storage
//!
//! API calls must fail fast on authentication problems (401/403) since the
//! user has to fix the API key, while file transfers run with high
//! concurrency and see transient throttling that is worth retrying.
//!
//! | HTTP Status | Api | FileIO |
//! |-------------|-----|--------|
//! | 401, 403 | no retry | no retry |
//! | 408, 429, 5xx | retry | retry |
//! | 409, 423 | no retry | retry |
//! | transport errors | retry | retry |
//!
//! # Configuration
//!
//! - `UNITLAB_MAX_RETRIES`: Maximum retry attempts per request (default: 3)
//! - `UNITLAB_TIMEOUT`: Request timeout in seconds (default: 30)

use url::Url;

/// Retry scope classification for URL-based retry policies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryScope {
    /// Unitlab SDK API calls under `/api/` on the configured API host.
    Api,
    /// File upload/download traffic to any other endpoint.
    FileIO,
}

/// Classifies a URL against the configured API host.
///
/// Only the parsed host is compared, so `https://evil.com/api.unitlab.ai/api/`
/// is never treated as an API call.
///
/// ```rust
/// use unitlab_client::{RetryScope, classify_url};
///
/// assert_eq!(
///     classify_url("https://api.unitlab.ai/api/sdk/projects/", "api.unitlab.ai"),
///     RetryScope::Api
/// );
/// assert_eq!(
///     classify_url("https://storage.googleapis.com/bucket/image.jpg", "api.unitlab.ai"),
///     RetryScope::FileIO
/// );
/// ```
pub fn classify_url(url: &str, api_host: &str) -> RetryScope {
    if let Ok(parsed) = Url::parse(url) {
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return RetryScope::FileIO;
        }

        if let Some(host) = parsed.host_str() {
            let path = parsed.path();
            let path_is_api = path == "/api" || path.starts_with("/api/");

            if host.eq_ignore_ascii_case(api_host) && path_is_api {
                return RetryScope::Api;
            }
        }
    }

    RetryScope::FileIO
}

/// Reads `UNITLAB_MAX_RETRIES`, defaulting to 3.
pub fn max_retries_from_env() -> u32 {
    std::env::var("UNITLAB_MAX_RETRIES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3)
}

/// Reads `UNITLAB_TIMEOUT` in seconds, defaulting to 30.
pub fn timeout_from_env() -> u64 {
    std::env::var("UNITLAB_TIMEOUT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30)
}

/// Creates a retry policy that classifies each request URL against
/// `api_host` and retries according to the table in the module docs.
pub fn create_retry_policy(api_host: String, max_retries: u32) -> reqwest::retry::Builder {
    reqwest::retry::for_host("*")
        .max_retries_per_request(max_retries)
        .classify_fn(move |req_rep| {
            let url = req_rep.uri().to_string();

            match classify_url(&url, &api_host) {
                RetryScope::Api => match req_rep.status() {
                    Some(status) => match status.as_u16() {
                        401 | 403 => req_rep.success(),
                        408 | 429 | 500..=599 => req_rep.retryable(),
                        _ => req_rep.success(),
                    },
                    None if req_rep.error().is_some() => req_rep.retryable(),
                    None => req_rep.success(),
                },
                RetryScope::FileIO => match req_rep.status() {
                    Some(status) => match status.as_u16() {
                        408 | 409 | 423 | 429 | 500..=599 => req_rep.retryable(),
                        _ => req_rep.success(),
                    },
                    None if req_rep.error().is_some() => req_rep.retryable(),
                    None => req_rep.success(),
                },
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "api.unitlab.ai";

    #[test]
    fn test_classify_url_api() {
        assert_eq!(
            classify_url("https://api.unitlab.ai/api/sdk/projects/", HOST),
            RetryScope::Api
        );
        assert_eq!(
            classify_url("https://api.unitlab.ai/api", HOST),
            RetryScope::Api
        );
        assert_eq!(
            classify_url("https://API.unitlab.ai:443/api/sdk/datasets/?pretty=0", HOST),
            RetryScope::Api
        );
        assert_eq!(
            classify_url("http://127.0.0.1:8000/api/sdk/projects/", "127.0.0.1"),
            RetryScope::Api
        );
    }

    #[test]
    fn test_classify_url_file_io() {
        assert_eq!(
            classify_url("https://storage.googleapis.com/bucket/file.jpg", HOST),
            RetryScope::FileIO
        );
        assert_eq!(
            classify_url("https://api.unitlab.ai/media/export.zip", HOST),
            RetryScope::FileIO
        );
        assert_eq!(
            classify_url("https://api.unitlab.ai/apis/other", HOST),
            RetryScope::FileIO
        );
    }

    #[test]
    fn test_classify_url_spoofing() {
        assert_eq!(
            classify_url("https://evil.com/api.unitlab.ai/api/", HOST),
            RetryScope::FileIO
        );
        assert_eq!(
            classify_url("https://api.unitlab.ai.evil.com/api/", HOST),
            RetryScope::FileIO
        );
        assert_eq!(
            classify_url("ftp://api.unitlab.ai/api/", HOST),
            RetryScope::FileIO
        );
        assert_eq!(classify_url("not a url", HOST), RetryScope::FileIO);
    }
}
