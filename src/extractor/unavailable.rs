//! Stub extractor for hosts without yt-dlp

use super::{DownloadRequest, MediaExtractor};
use crate::error::{ExtractorError, ExtractorErrorKind};
use crate::identity::IdentityProfile;
use crate::types::{MediaKind, MediaMetadata};
use async_trait::async_trait;
use std::path::PathBuf;

/// Extractor used when no external binary is available
///
/// Every call fails with a non-retryable error so requests fail fast instead of
/// burning retries.
///
/// ```
/// use media_fetch::MediaKind;
/// use media_fetch::extractor::{MediaExtractor, UnavailableExtractor};
/// use media_fetch::identity::IdentityRotator;
///
/// # #[tokio::main]
/// # async fn main() {
/// let identity = IdentityRotator::default().next_profile();
/// let result = UnavailableExtractor
///     .extract_metadata("https://youtu.be/abc", MediaKind::Audio, &identity)
///     .await;
/// assert!(result.is_err());
/// # }
/// ```
pub struct UnavailableExtractor;

const MESSAGE: &str = "media extraction requires the yt-dlp binary. \
                       Configure extractor.binary_path or ensure yt-dlp is in PATH.";

#[async_trait]
impl MediaExtractor for UnavailableExtractor {
    async fn extract_metadata(
        &self,
        _url: &str,
        _kind: MediaKind,
        _identity: &IdentityProfile,
    ) -> Result<MediaMetadata, ExtractorError> {
        Err(ExtractorError::new(
            ExtractorErrorKind::UnsupportedContent,
            MESSAGE,
        ))
    }

    async fn download(&self, _request: &DownloadRequest) -> Result<PathBuf, ExtractorError> {
        Err(ExtractorError::new(
            ExtractorErrorKind::UnsupportedContent,
            MESSAGE,
        ))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}
