//! Configuration types for media-fetch

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Retry configuration for extractor attempts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts per fetch, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay of the backoff curve (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Upper bound for a single backoff sleep, jitter included (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,

    /// Bound on a single extractor call; exceeding it counts as a network timeout
    /// (default: 300 seconds)
    #[serde(default = "default_attempt_timeout", with = "duration_serde")]
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
            attempt_timeout: default_attempt_timeout(),
        }
    }
}

/// Sliding-window admission settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Admissions allowed per requester inside one window (default: 5)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Length of the sliding window (default: 300 seconds)
    #[serde(default = "default_window", with = "duration_serde")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window: default_window(),
        }
    }
}

/// Request handle settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandleConfig {
    /// How long an issued handle stays resolvable (default: 600 seconds)
    #[serde(default = "default_handle_ttl", with = "duration_serde")]
    pub ttl: Duration,

    /// Interval of the background sweep for expired handles and idle windows
    /// (default: 60 seconds)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    pub sweep_interval: Duration,

    /// Number of alphanumeric characters per token (default: 12)
    #[serde(default = "default_token_length")]
    pub token_length: usize,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            ttl: default_handle_ttl(),
            sweep_interval: default_sweep_interval(),
            token_length: default_token_length(),
        }
    }
}

/// Staging directory and artifact ceiling
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Root directory for per-request staging folders (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Largest artifact handed to the transport, in bytes (default: 50 MiB)
    #[serde(default = "default_max_artifact_size")]
    pub max_artifact_size: u64,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_artifact_size: default_max_artifact_size(),
        }
    }
}

/// External extractor (yt-dlp) settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Whether to search PATH for the binary if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Socket timeout passed to the extractor (default: 30 seconds)
    #[serde(default = "default_socket_timeout", with = "duration_serde")]
    pub socket_timeout: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            search_path: true,
            socket_timeout: default_socket_timeout(),
        }
    }
}

/// One allow-listed platform
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEntry {
    /// Registrable domain, lower case, without `www.` (e.g. "youtube.com")
    pub domain: String,
    /// Display name shown to requesters
    pub name: String,
}

impl PlatformEntry {
    /// Create a platform entry
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
        }
    }
}

/// Platform allow-list
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Domains links may point at
    #[serde(default = "default_platforms")]
    pub platforms: Vec<PlatformEntry>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            platforms: default_platforms(),
        }
    }
}

/// Main configuration for MediaFetcher
///
/// Fields are organized into logical sub-configs:
/// - [`retry`](RetryConfig) - attempts, backoff curve, per-attempt timeout
/// - [`rate_limit`](RateLimitConfig) - per-requester admission window
/// - [`handles`](HandleConfig) - token TTL and sweeping
/// - [`staging`](StagingConfig) - download directory and size ceiling
/// - [`extractor`](ExtractorConfig) - yt-dlp discovery
/// - [`platforms`](PlatformConfig) - allow-listed link domains
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Retry behaviour of the fetch engine
    #[serde(default)]
    pub retry: RetryConfig,

    /// Admission control
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Handle registry
    #[serde(default)]
    pub handles: HandleConfig,

    /// Staging and delivery
    #[serde(default)]
    pub staging: StagingConfig,

    /// External extractor
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Platform allow-list
    #[serde(flatten)]
    pub platforms: PlatformConfig,

    /// Instance lock file (default: "./media-fetch.lock")
    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,
}

impl Config {
    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the orchestrator cannot honour
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> Result<()> {
            Err(Error::Config {
                message: message.to_string(),
                key: Some(key.to_string()),
            })
        }

        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts", "at least one attempt is required");
        }
        if self.retry.max_delay < self.retry.initial_delay {
            return invalid(
                "retry.max_delay",
                "max_delay must not be smaller than initial_delay",
            );
        }
        if self.retry.backoff_multiplier < 1.0 {
            return invalid("retry.backoff_multiplier", "multiplier must be >= 1.0");
        }
        if self.retry.attempt_timeout.is_zero() {
            return invalid("retry.attempt_timeout", "attempt timeout must be positive");
        }
        if self.rate_limit.max_requests == 0 {
            return invalid("rate_limit.max_requests", "quota must be at least 1");
        }
        if self.rate_limit.window.is_zero() {
            return invalid("rate_limit.window", "window must be positive");
        }
        if self.handles.ttl.is_zero() {
            return invalid("handles.ttl", "handle TTL must be positive");
        }
        if self.handles.sweep_interval.is_zero() {
            return invalid("handles.sweep_interval", "sweep interval must be positive");
        }
        if !(6..=48).contains(&self.handles.token_length) {
            return invalid("handles.token_length", "token length must be within 6..=48");
        }
        if self.staging.max_artifact_size == 0 {
            return invalid("staging.max_artifact_size", "size ceiling must be positive");
        }
        if self.platforms.platforms.is_empty() {
            return invalid("platforms", "at least one platform must be allow-listed");
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_max_requests() -> u32 {
    5
}

fn default_window() -> Duration {
    Duration::from_secs(300)
}

fn default_handle_ttl() -> Duration {
    Duration::from_secs(600)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_token_length() -> usize {
    12
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_artifact_size() -> u64 {
    50 * 1024 * 1024
}

fn default_socket_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_lock_path() -> PathBuf {
    PathBuf::from("./media-fetch.lock")
}

fn default_platforms() -> Vec<PlatformEntry> {
    vec![
        PlatformEntry::new("youtube.com", "YouTube"),
        PlatformEntry::new("youtu.be", "YouTube"),
        PlatformEntry::new("tiktok.com", "TikTok"),
        PlatformEntry::new("instagram.com", "Instagram"),
        PlatformEntry::new("facebook.com", "Facebook"),
        PlatformEntry::new("twitter.com", "Twitter"),
        PlatformEntry::new("x.com", "X (Twitter)"),
        PlatformEntry::new("soundcloud.com", "SoundCloud"),
        PlatformEntry::new("vimeo.com", "Vimeo"),
    ]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
