use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SummarizelyError {
    #[error("Captions not available for {url}: {reason}")]
    CaptionsUnavailable { url: String, reason: String },

    #[error("{tool} failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SummarizelyError>;

/// Closed taxonomy every provider failure is mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unavailable,
    Timeout,
    Auth,
    RateLimit,
    InvalidRequest,
    NotFound,
    NoModels,
    Unknown,
}

impl ErrorKind {
    /// Map an HTTP error status to a kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorKind::Auth,
            429 => ErrorKind::RateLimit,
            400..=499 => ErrorKind::InvalidRequest,
            500..=599 => ErrorKind::Unavailable,
            _ => ErrorKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Auth => "auth",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NoModels => "no_models",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified provider failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status when the failure came from a response.
    pub status: Option<u16>,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = body.trim();
        let message = if detail.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, truncate(detail, 300))
        };
        Self {
            kind: ErrorKind::from_status(status),
            message,
            status: Some(status),
        }
    }

    pub fn timeout(timeout: std::time::Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("no response within {:.0}s", timeout.as_secs_f64()),
        )
    }

    /// Timeouts and server-side errors; worth one more try.
    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Timeout || self.status.is_some_and(|s| s >= 500)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Auth);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Auth);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimit);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::InvalidRequest);
        assert_eq!(ErrorKind::from_status(400), ErrorKind::InvalidRequest);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::Unavailable);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Unavailable);
        assert_eq!(ErrorKind::from_status(302), ErrorKind::Unknown);
    }

    #[test]
    fn test_transient() {
        assert!(ProviderError::from_status(502, "").is_transient());
        assert!(ProviderError::timeout(std::time::Duration::from_secs(1)).is_transient());
        assert!(!ProviderError::from_status(429, "slow down").is_transient());
        assert!(!ProviderError::new(ErrorKind::Unavailable, "connection refused").is_transient());
    }

    #[test]
    fn test_display() {
        let err = ProviderError::from_status(429, "too many requests");
        assert_eq!(err.to_string(), "rate_limit: HTTP 429: too many requests");
        assert_eq!(err.status, Some(429));
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(400);
        let err = ProviderError::from_status(500, &body);
        assert!(err.message.ends_with("..."));
        assert!(err.message.len() < 320);
    }
}
