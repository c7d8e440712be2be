//! Error types for media-fetch
//!
//! This module provides the error taxonomy for the orchestrator:
//! - Admission and handle errors reported straight back to the requester
//! - Extractor errors classified by [`ExtractorErrorKind`]
//! - Fetch errors that survive the retry engine (fatal or exhausted)
//! - Delivery errors raised while staging and handing over artifacts
//! - Machine-readable codes and user-facing messages via [`UserFacing`]

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for media-fetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum number of characters of an underlying cause shown to a requester
pub const USER_EXCERPT_CHARS: usize = 100;

/// Main error type for media-fetch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "retry.max_attempts")
        key: Option<String>,
    },

    /// The requester exceeded the admission quota
    #[error("admission denied: retry after {}s", .retry_after.as_secs())]
    AdmissionDenied {
        /// Time until the oldest admission leaves the window
        retry_after: Duration,
    },

    /// No handle exists for the token (never issued, consumed, or foreign)
    #[error("handle not found")]
    HandleNotFound,

    /// The handle outlived its TTL
    #[error("handle expired")]
    HandleExpired,

    /// The link does not belong to an allow-listed platform
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    /// Fetching failed after the retry engine gave up
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Staging or delivery failed
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Another process holds the instance lock
    #[error("instance lock {} is held by another process{}", .path.display(), .holder.map(|pid| format!(" (pid {pid})")).unwrap_or_default())]
    LockUnavailable {
        /// Lock file path
        path: PathBuf,
        /// PID recorded by the current holder, when readable
        holder: Option<u32>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress")]
    ShuttingDown,
}

/// Class of failure reported by the extraction capability
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtractorErrorKind {
    /// The host challenged the request as automated traffic
    BotDetection,
    /// The host throttled the request
    RateLimited,
    /// Connection problem or attempt timeout
    NetworkTimeout,
    /// Malformed link or content the extractor cannot handle
    UnsupportedContent,
    /// The resource is gone or private
    NotFound,
    /// Anything the classifier did not recognise
    Unknown,
}

impl std::fmt::Display for ExtractorErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExtractorErrorKind::BotDetection => "bot detection",
            ExtractorErrorKind::RateLimited => "rate limited",
            ExtractorErrorKind::NetworkTimeout => "network timeout",
            ExtractorErrorKind::UnsupportedContent => "unsupported content",
            ExtractorErrorKind::NotFound => "not found",
            ExtractorErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Error returned by a [`MediaExtractor`](crate::extractor::MediaExtractor)
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ExtractorError {
    /// Classified failure
    pub kind: ExtractorErrorKind,
    /// Raw detail from the extractor
    pub message: String,
}

impl ExtractorError {
    /// Create a classified extractor error
    pub fn new(kind: ExtractorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Fetch failures that surface from the retry engine
///
/// Retryable failures are absorbed by the engine and only appear here wrapped
/// in [`FetchError::Exhausted`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// A non-retryable failure stopped the sequence early
    #[error("{0}")]
    Fatal(ExtractorError),

    /// Every attempt failed
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error of the final attempt
        last: ExtractorError,
    },
}

impl FetchError {
    /// The extractor error behind this failure
    pub fn cause(&self) -> &ExtractorError {
        match self {
            FetchError::Fatal(e) => e,
            FetchError::Exhausted { last, .. } => last,
        }
    }
}

/// Errors raised by the staging and delivery step
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The extractor reported success but no file of the expected kind exists
    #[error("no artifact found in {}", .dir.display())]
    ArtifactMissing {
        /// Staging directory that was searched
        dir: PathBuf,
    },

    /// The artifact exceeds the configured ceiling
    #[error("artifact is {size} bytes, limit is {limit} bytes")]
    ArtifactTooLarge {
        /// Measured (or estimated) size in bytes
        size: u64,
        /// Configured maximum in bytes
        limit: u64,
    },

    /// The transport failed to upload the file
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Map errors to what a requester gets to see
///
/// This is the chat-side counterpart of an HTTP status mapping: a stable code for
/// logs and events, and a message with remediation guidance.
pub trait UserFacing {
    /// Machine-readable error code
    fn error_code(&self) -> &str;

    /// Message suitable for sending to the requester
    fn user_message(&self) -> String;
}

impl UserFacing for Error {
    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::AdmissionDenied { .. } => "admission_denied",
            Error::HandleNotFound => "handle_not_found",
            Error::HandleExpired => "handle_expired",
            Error::UnsupportedSource(_) => "unsupported_source",
            Error::Fetch(e) => match e {
                FetchError::Fatal(_) => "fetch_fatal",
                FetchError::Exhausted { .. } => "fetch_exhausted",
            },
            Error::Delivery(e) => match e {
                DeliveryError::ArtifactMissing { .. } => "artifact_missing",
                DeliveryError::ArtifactTooLarge { .. } => "artifact_too_large",
                DeliveryError::DeliveryFailed(_) => "delivery_failed",
            },
            Error::LockUnavailable { .. } => "lock_unavailable",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ShuttingDown => "shutting_down",
        }
    }

    fn user_message(&self) -> String {
        match self {
            Error::AdmissionDenied { retry_after } => format!(
                "Too many requests. Please wait {} seconds before sending another link.",
                retry_after.as_secs().max(1)
            ),
            Error::HandleNotFound | Error::HandleExpired => {
                "This link has expired. Please send it again.".to_string()
            }
            Error::UnsupportedSource(_) => {
                "Sorry, this link is not supported. Make sure it comes from a supported platform."
                    .to_string()
            }
            Error::Fetch(e) => format!(
                "Download failed.\n\nReason: {}\n\nTry another link or audio only.",
                excerpt(&e.cause().message, USER_EXCERPT_CHARS)
            ),
            Error::Delivery(DeliveryError::ArtifactTooLarge { size, limit }) => format!(
                "File is too large.\n\nSize: {}\nMaximum: {}",
                format_megabytes(*size),
                format_megabytes(*limit)
            ),
            Error::Delivery(DeliveryError::ArtifactMissing { .. }) => {
                "The downloaded file could not be found.".to_string()
            }
            Error::Delivery(DeliveryError::DeliveryFailed(_)) => {
                "The file could not be sent. Please try again.".to_string()
            }
            Error::ShuttingDown => "The service is restarting. Please try again shortly.".to_string(),
            Error::Config { .. }
            | Error::LockUnavailable { .. }
            | Error::Io(_)
            | Error::Serialization(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// Truncate `text` to at most `max_chars` characters, marking the cut with `...`
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Render a byte count as megabytes with one decimal
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_keeps_short_text_intact() {
        assert_eq!(excerpt("short", 100), "short");
        assert_eq!(excerpt("", 10), "");
    }

    #[test]
    fn excerpt_cuts_on_char_boundaries() {
        let text = "é".repeat(150);
        let cut = excerpt(&text, 100);
        assert_eq!(cut.chars().count(), 103);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn fetch_message_bounds_the_cause() {
        let err = Error::Fetch(FetchError::Exhausted {
            attempts: 3,
            last: ExtractorError::new(ExtractorErrorKind::BotDetection, "x".repeat(500)),
        });
        let message = err.user_message();
        assert!(message.len() < 250, "cause must be excerpted: {message}");
        assert_eq!(err.error_code(), "fetch_exhausted");
    }

    #[test]
    fn too_large_message_reports_size_and_ceiling() {
        let err = Error::Delivery(DeliveryError::ArtifactTooLarge {
            size: 60 * 1024 * 1024,
            limit: 50 * 1024 * 1024,
        });
        let message = err.user_message();
        assert!(message.contains("60.0 MB"), "{message}");
        assert!(message.contains("50.0 MB"), "{message}");
        assert_eq!(err.error_code(), "artifact_too_large");
    }

    #[test]
    fn admission_message_never_says_zero_seconds() {
        let err = Error::AdmissionDenied {
            retry_after: Duration::from_millis(300),
        };
        assert!(err.user_message().contains("1 seconds"));
    }

    #[test]
    fn expired_and_missing_handles_share_remediation() {
        assert_eq!(
            Error::HandleExpired.user_message(),
            Error::HandleNotFound.user_message()
        );
        assert_ne!(
            Error::HandleExpired.error_code(),
            Error::HandleNotFound.error_code()
        );
    }

    #[test]
    fn lock_unavailable_mentions_holder_pid() {
        let err = Error::LockUnavailable {
            path: PathBuf::from("/tmp/x.lock"),
            holder: Some(4242),
        };
        assert!(err.to_string().contains("pid 4242"));
        let anonymous = Error::LockUnavailable {
            path: PathBuf::from("/tmp/x.lock"),
            holder: None,
        };
        assert!(!anonymous.to_string().contains("pid"));
    }
}
