//! Typed errors for the extraction pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Every error carries a
//! category, a retryable flag, and a remediation hint so batch callers
//! can build structured per-item failure payloads.

use thiserror::Error;

/// Errors that can occur during extraction operations.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Malformed input (missing or invalid URL, empty id).
    ///
    /// Surfaced immediately; no network call is made and no retry happens.
    #[error("invalid input: {reason}")]
    Validation { reason: String },

    /// Outbound fetch failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The site structure was unrecognized and the generic fallback
    /// also failed to produce minimally useful data.
    #[error("parse failed for {url}: {reason}")]
    Parse { url: String, reason: String },

    /// Cache backend failure (degraded to a miss by callers).
    #[error("cache error: {0}")]
    Cache(String),

    /// JSON encoding/decoding of a cached payload failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the outbound HTTP layer.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request exceeded its time budget.
    #[error("timeout fetching {url} after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Upstream returned a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Body was empty or too small to be a real page.
    #[error("empty or near-empty body from {url} ({length} bytes)")]
    EmptyBody { url: String, length: usize },

    /// Response was not HTML (binary download, JSON API, etc).
    #[error("unexpected content type {content_type:?} from {url}")]
    ContentType {
        url: String,
        content_type: Option<String>,
    },

    /// URL could not be parsed at all.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

/// Coarse error category exposed to callers in failure payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Timeout,
    Network,
    Parse,
    Cache,
}

impl ExtractionError {
    /// Category for the structured error payload.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Fetch(FetchError::Timeout { .. }) => ErrorCategory::Timeout,
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Parse { .. } => ErrorCategory::Parse,
            Self::Cache(_) | Self::Json(_) => ErrorCategory::Cache,
        }
    }

    /// Whether one automatic retry of the whole pipeline is worthwhile.
    ///
    /// Validation failures never retry; everything that touched the
    /// network gets exactly one more attempt.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Fetch(
                FetchError::Timeout { .. }
                    | FetchError::Network { .. }
                    | FetchError::Status { .. }
                    | FetchError::EmptyBody { .. }
            )
        )
    }

    /// Human-readable remediation hint for the failure payload.
    pub fn hint(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Validation => "check that the search result has a valid absolute URL",
            ErrorCategory::Timeout => "increase the extraction timeout or try again later",
            ErrorCategory::Network => "the target site may be temporarily unavailable",
            ErrorCategory::Parse => {
                "the site layout may have changed; generic extraction was attempted"
            }
            ErrorCategory::Cache => "the cache backend failed; extraction still ran uncached",
        }
    }
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_not_retryable() {
        let err = ExtractionError::Validation {
            reason: "missing url".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(!err.retryable());
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = ExtractionError::Fetch(FetchError::Timeout {
            url: "https://example.com".into(),
            timeout_ms: 5000,
        });
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert!(err.retryable());
    }

    #[test]
    fn test_parse_not_retryable() {
        let err = ExtractionError::Parse {
            url: "https://example.com/x".into(),
            reason: "no fields".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Parse);
        assert!(!err.retryable());
    }

    #[test]
    fn test_status_maps_to_network() {
        let err = ExtractionError::Fetch(FetchError::Status {
            url: "https://example.com".into(),
            status: 503,
        });
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.retryable());
    }
}
