//! Media extraction capability
//!
//! The orchestrator never talks to a media host directly. It asks a
//! [`MediaExtractor`] for metadata and for a file, and gets back either a path or a
//! classified [`ExtractorError`].
//!
//! ## Implementations
//!
//! - [`CliExtractor`]: drives an external `yt-dlp` binary
//! - [`UnavailableExtractor`]: stub used when no binary is available
//!
//! ## Usage
//!
//! ```no_run
//! use media_fetch::MediaKind;
//! use media_fetch::extractor::{CliExtractor, MediaExtractor};
//! use media_fetch::identity::IdentityRotator;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let extractor = CliExtractor::from_path().expect("yt-dlp not found in PATH");
//! let identity = IdentityRotator::default().next_profile();
//!
//! let meta = extractor
//!     .extract_metadata("https://youtu.be/dQw4w9WgXcQ", MediaKind::Video, &identity)
//!     .await?;
//! println!("{} by {}", meta.title, meta.uploader);
//! # Ok(())
//! # }
//! ```

mod classify;
mod cli;
mod unavailable;

pub use classify::{classify_stderr, parse_metadata_json};
pub use cli::CliExtractor;
pub use unavailable::UnavailableExtractor;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::identity::IdentityProfile;
use crate::types::{MediaKind, MediaMetadata};

/// Everything an extractor needs to produce one file
#[derive(Clone, Debug)]
pub struct DownloadRequest {
    /// Link to fetch
    pub url: String,
    /// Video or audio
    pub kind: MediaKind,
    /// Directory the file must be written into
    pub destination_dir: PathBuf,
    /// File name without extension; the extractor picks the extension
    pub file_stem: String,
    /// Identity to present for this attempt
    pub identity: IdentityProfile,
}

/// Trait for fetching media from supported platforms
///
/// Implementations classify their failures with
/// [`ExtractorErrorKind`](crate::error::ExtractorErrorKind) so the fetch engine can
/// decide whether another attempt is worthwhile.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Fetch title, duration, uploader and, when known, the size of the format
    /// `kind` selects
    ///
    /// For audio the estimate describes the source stream, not the transcoded file.
    ///
    /// # Errors
    ///
    /// Returns a classified error if the host refuses the request or the output
    /// cannot be understood.
    async fn extract_metadata(
        &self,
        url: &str,
        kind: MediaKind,
        identity: &IdentityProfile,
    ) -> Result<MediaMetadata, ExtractorError>;

    /// Download the media described by `request` and return the produced file
    ///
    /// The file must be created inside `request.destination_dir`. Partial output
    /// left behind on failure is cleaned up by the caller.
    async fn download(&self, request: &DownloadRequest) -> Result<PathBuf, ExtractorError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Pick an extractor according to configuration
///
/// Uses the configured binary when set, otherwise searches `PATH` if allowed, and
/// falls back to [`UnavailableExtractor`] so the service can still start and
/// report a clear error per request.
pub fn from_config(config: &ExtractorConfig) -> Arc<dyn MediaExtractor> {
    if let Some(path) = &config.binary_path {
        tracing::info!(path = %path.display(), "using configured yt-dlp binary");
        return Arc::new(CliExtractor::new(path.clone(), config.socket_timeout));
    }

    if config.search_path
        && let Some(extractor) = CliExtractor::from_path()
    {
        tracing::info!(path = %extractor.binary_path().display(), "found yt-dlp in PATH");
        return Arc::new(extractor.with_socket_timeout(config.socket_timeout));
    }

    tracing::warn!("yt-dlp not available, downloads will fail until it is installed");
    Arc::new(UnavailableExtractor)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_binary_wins_over_path_search() {
        let config = ExtractorConfig {
            binary_path: Some(PathBuf::from("/opt/tools/yt-dlp")),
            search_path: true,
            ..ExtractorConfig::default()
        };
        assert_eq!(from_config(&config).name(), "cli-yt-dlp");
    }

    #[test]
    fn disabled_search_without_binary_is_unavailable() {
        let config = ExtractorConfig {
            binary_path: None,
            search_path: false,
            ..ExtractorConfig::default()
        };
        assert_eq!(from_config(&config).name(), "unavailable");
    }
}
