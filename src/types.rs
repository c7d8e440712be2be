//! Core types for media-fetch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier of the principal (chat user) submitting requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterId(pub i64);

impl RequesterId {
    /// Create a new RequesterId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for RequesterId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RequesterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequesterId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Opaque short-lived token standing in for a submitted link
///
/// Tokens are alphanumeric so they fit into size-constrained callback payloads
/// and can be used verbatim as file and directory names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleToken(String);

impl HandleToken {
    /// Wrap an existing token string
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the token only contains characters that are safe as a path component
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty() && self.0.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

impl std::fmt::Display for HandleToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HandleToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// What the requester asked to receive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Best available video
    Video,
    /// Audio track extracted to mp3
    Audio,
}

impl MediaKind {
    /// Format selector handed to the extractor
    pub fn format_spec(&self) -> &'static str {
        match self {
            MediaKind::Video => "best[ext=mp4]/best",
            MediaKind::Audio => "bestaudio/best",
        }
    }

    /// File suffixes an artifact of this kind may carry
    pub fn expected_extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Video => &["mp4", "mkv", "webm", "avi"],
            MediaKind::Audio => &["mp3"],
        }
    }

    /// Stable lowercase name, also used as the callback prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// Metadata reported by the extractor before a download
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Title of the resource
    pub title: String,
    /// Duration in seconds (0 when unknown)
    pub duration_secs: u64,
    /// Uploader or channel name
    pub uploader: String,
    /// Approximate size of the selected format in bytes, when the host reports one
    pub size_estimate: Option<u64>,
}

impl MediaMetadata {
    /// Placeholder used when metadata extraction fails
    pub fn placeholder(kind: MediaKind) -> Self {
        Self {
            title: kind.as_str().to_string(),
            duration_secs: 0,
            uploader: "unknown".to_string(),
            size_estimate: None,
        }
    }

    /// Caption sent alongside the delivered file
    pub fn caption(&self) -> String {
        format!(
            "{}\n\nDuration: {}\nUploader: {}",
            crate::error::excerpt(&self.title, 50),
            format_duration(self.duration_secs),
            self.uploader
        )
    }
}

/// Render seconds as `m:ss`
pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Outcome of a single extractor invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Artifact produced
    Success,
    /// Transient failure, another attempt may follow
    RetryableFailure,
    /// Permanent failure, the sequence stops
    FatalFailure,
}

/// Record of one fetch attempt (transient, never persisted)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchAttempt {
    /// 1-based attempt number
    pub attempt_no: u32,
    /// User-Agent presented on this attempt
    pub user_agent: String,
    /// How the attempt ended
    pub outcome: AttemptOutcome,
    /// Extractor error text for failed attempts
    pub error_detail: Option<String>,
}

/// A file delivered to the transport
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredArtifact {
    /// What was delivered
    pub kind: MediaKind,
    /// Size of the delivered file in bytes
    pub size_bytes: u64,
    /// File name as it was staged (the file itself is gone by now)
    pub file_name: String,
    /// Number of extractor attempts it took
    pub attempts: u32,
}

/// Result of a successful link submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    /// Token to present back with the chosen action
    pub token: HandleToken,
    /// The submitted link, trimmed
    pub url: String,
    /// Display name of the matched platform
    pub platform: String,
}

/// Path of a staged file together with its size, handed to the transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedArtifact {
    /// Location inside the request's staging directory
    pub path: PathBuf,
    /// Measured size in bytes
    pub size_bytes: u64,
    /// Kind of media the file holds
    pub kind: MediaKind,
}

/// Events emitted by the orchestrator
///
/// Consumers such as a statistics collector subscribe via
/// [`MediaFetcher::subscribe`](crate::MediaFetcher::subscribe). Sending never blocks and
/// events are dropped when nobody listens.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A link was accepted and a handle issued
    Submitted {
        /// Who submitted
        requester: RequesterId,
        /// Platform display name
        platform: String,
    },

    /// A handle was consumed and fetching started
    Dispatched {
        /// Who selected the action
        requester: RequesterId,
        /// Requested media kind
        kind: MediaKind,
    },

    /// A fetch attempt failed (retryable or not)
    AttemptFailed {
        /// Attempt number
        attempt: u32,
        /// Whether another attempt may follow
        retryable: bool,
        /// Bounded error excerpt
        error: String,
    },

    /// A file reached the transport
    Delivered {
        /// Who received it
        requester: RequesterId,
        /// Media kind
        kind: MediaKind,
        /// Size in bytes
        size_bytes: u64,
        /// Delivery time
        at: DateTime<Utc>,
    },

    /// A dispatched request ended without delivery
    Failed {
        /// Who was affected
        requester: RequesterId,
        /// Media kind
        kind: MediaKind,
        /// Machine-readable error code
        code: String,
    },

    /// The orchestrator is shutting down
    Shutdown,
}
