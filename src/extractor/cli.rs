//! yt-dlp backed extractor

use super::classify::{classify_stderr, parse_metadata_json};
use super::{DownloadRequest, MediaExtractor};
use crate::error::{ExtractorError, ExtractorErrorKind};
use crate::identity::IdentityProfile;
use crate::types::{MediaKind, MediaMetadata};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Extractor that shells out to an external `yt-dlp` binary
///
/// The child process is killed if the future driving it is dropped, so the fetch
/// engine's per-attempt timeout also stops the download.
///
/// # Examples
///
/// ```no_run
/// use media_fetch::extractor::CliExtractor;
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// // Create with explicit path
/// let extractor = CliExtractor::new(PathBuf::from("/usr/local/bin/yt-dlp"), Duration::from_secs(30));
///
/// // Or auto-discover from PATH
/// let extractor = CliExtractor::from_path().expect("yt-dlp not found in PATH");
/// ```
pub struct CliExtractor {
    binary_path: PathBuf,
    socket_timeout: Duration,
}

impl CliExtractor {
    /// Create a new CLI extractor with an explicit binary path
    pub fn new(binary_path: PathBuf, socket_timeout: Duration) -> Self {
        Self {
            binary_path,
            socket_timeout,
        }
    }

    /// Attempt to find yt-dlp in PATH
    ///
    /// Returns `None` when the binary is not installed.
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp")
            .ok()
            .map(|path| Self::new(path, Duration::from_secs(30)))
    }

    /// Override the network socket timeout passed to yt-dlp
    pub fn with_socket_timeout(mut self, socket_timeout: Duration) -> Self {
        self.socket_timeout = socket_timeout;
        self
    }

    /// Path of the binary in use
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Arguments shared by every invocation
    fn base_args(&self, identity: &IdentityProfile) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--no-progress".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout.as_secs().max(1).to_string(),
            "--user-agent".to_string(),
            identity.user_agent.clone(),
        ];
        for (name, value) in identity.headers() {
            args.push("--add-header".to_string());
            args.push(format!("{name}:{value}"));
        }
        args
    }

    /// Arguments for a metadata lookup of the format `kind` would download
    fn metadata_args(&self, url: &str, kind: MediaKind, identity: &IdentityProfile) -> Vec<String> {
        let mut args = self.base_args(identity);
        args.push("--format".to_string());
        args.push(kind.format_spec().to_string());
        args.push("--dump-json".to_string());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    /// Arguments for a download into `request.destination_dir`
    fn download_args(&self, request: &DownloadRequest) -> Vec<String> {
        let mut args = self.base_args(&request.identity);
        let template = request
            .destination_dir
            .join(format!("{}.%(ext)s", request.file_stem));

        args.push("--format".to_string());
        args.push(request.kind.format_spec().to_string());
        args.push("--output".to_string());
        args.push(template.to_string_lossy().into_owned());

        if request.kind == MediaKind::Audio {
            args.extend(
                ["--extract-audio", "--audio-format", "mp3", "--audio-quality", "192K"]
                    .map(String::from),
            );
        }

        args.push("--".to_string());
        args.push(request.url.clone());
        args
    }

    async fn run(&self, args: &[String]) -> Result<Output, ExtractorError> {
        Command::new(&self.binary_path)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ExtractorError::new(
                    ExtractorErrorKind::Unknown,
                    format!("failed to execute {}: {}", self.binary_path.display(), e),
                )
            })
    }
}

/// First file named `<stem>.<ext>` in `dir` with an extension allowed for `kind`
async fn find_output(dir: &Path, stem: &str, kind: MediaKind) -> Option<PathBuf> {
    for ext in kind.expected_extensions() {
        let candidate = dir.join(format!("{stem}.{ext}"));
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Some(candidate);
        }
    }
    None
}

#[async_trait]
impl MediaExtractor for CliExtractor {
    async fn extract_metadata(
        &self,
        url: &str,
        kind: MediaKind,
        identity: &IdentityProfile,
    ) -> Result<MediaMetadata, ExtractorError> {
        let args = self.metadata_args(url, kind, identity);
        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(classify_stderr(&String::from_utf8_lossy(&output.stderr)));
        }
        parse_metadata_json(&String::from_utf8_lossy(&output.stdout))
    }

    async fn download(&self, request: &DownloadRequest) -> Result<PathBuf, ExtractorError> {
        let args = self.download_args(request);
        tracing::debug!(
            url = %request.url,
            kind = %request.kind,
            dir = %request.destination_dir.display(),
            "starting yt-dlp download"
        );

        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(classify_stderr(&String::from_utf8_lossy(&output.stderr)));
        }

        find_output(&request.destination_dir, &request.file_stem, request.kind)
            .await
            .ok_or_else(|| {
                ExtractorError::new(
                    ExtractorErrorKind::Unknown,
                    format!(
                        "yt-dlp reported success but produced no {} file",
                        request.kind
                    ),
                )
            })
    }

    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }
}
