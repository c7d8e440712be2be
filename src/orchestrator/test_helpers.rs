//! Shared test helpers: a scripted extractor, a recording transport, and a
//! ready-made `MediaFetcher` over a temporary directory.

use crate::config::Config;
use crate::error::{ExtractorError, ExtractorErrorKind};
use crate::extractor::{DownloadRequest, MediaExtractor};
use crate::identity::IdentityProfile;
use crate::orchestrator::{MediaFetcher, Transport};
use crate::types::{MediaKind, MediaMetadata, RequesterId, StagedArtifact};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::tempdir;

/// What the scripted extractor does on its next download call
#[derive(Clone, Debug)]
pub(crate) enum Step {
    /// Fail with the given kind
    Fail(ExtractorErrorKind),
    /// Write a partial file, then fail
    FailWithPartial(ExtractorErrorKind),
    /// Write `<stem>.<ext>` with `bytes` bytes
    Produce { ext: &'static str, bytes: usize },
    /// Never complete
    Hang,
}

/// Extractor that follows a fixed script, one step per download call
pub(crate) struct ScriptedExtractor {
    steps: Mutex<VecDeque<Step>>,
    metadata: Option<MediaMetadata>,
    seen: Mutex<Vec<IdentityProfile>>,
    empty_on_entry: Mutex<Vec<bool>>,
}

impl ScriptedExtractor {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            metadata: None,
            seen: Mutex::new(Vec::new()),
            empty_on_entry: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_metadata(mut self, metadata: MediaMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub(crate) fn seen_user_agents(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.user_agent.clone())
            .collect()
    }

    pub(crate) fn dir_was_empty_on_entry(&self) -> Vec<bool> {
        self.empty_on_entry.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaExtractor for ScriptedExtractor {
    async fn extract_metadata(
        &self,
        _url: &str,
        _kind: MediaKind,
        _identity: &IdentityProfile,
    ) -> Result<MediaMetadata, ExtractorError> {
        self.metadata
            .clone()
            .ok_or_else(|| ExtractorError::new(ExtractorErrorKind::Unknown, "no metadata scripted"))
    }

    async fn download(&self, request: &DownloadRequest) -> Result<PathBuf, ExtractorError> {
        self.seen.lock().unwrap().push(request.identity.clone());
        let empty = std::fs::read_dir(&request.destination_dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        self.empty_on_entry.lock().unwrap().push(empty);

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Fail(kind)) => Err(ExtractorError::new(kind, format!("scripted {kind}"))),
            Some(Step::FailWithPartial(kind)) => {
                let partial = request
                    .destination_dir
                    .join(format!("{}.mp4.part", request.file_stem));
                std::fs::write(partial, b"partial").unwrap();
                Err(ExtractorError::new(kind, format!("scripted {kind}")))
            }
            Some(Step::Produce { ext, bytes }) => {
                let path = request
                    .destination_dir
                    .join(format!("{}.{}", request.file_stem, ext));
                std::fs::write(&path, vec![0u8; bytes]).unwrap();
                Ok(path)
            }
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ExtractorError::new(ExtractorErrorKind::Unknown, "woke up"))
            }
            None => Err(ExtractorError::new(
                ExtractorErrorKind::Unknown,
                "script exhausted",
            )),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// A file the recording transport received
#[derive(Clone, Debug)]
pub(crate) struct SentFile {
    pub(crate) requester: RequesterId,
    pub(crate) path: PathBuf,
    pub(crate) size_bytes: u64,
    pub(crate) existed_during_send: bool,
    pub(crate) caption: String,
}

/// Transport that records everything and optionally refuses uploads
#[derive(Default)]
pub(crate) struct RecordingTransport {
    pub(crate) texts: Mutex<Vec<(RequesterId, String)>>,
    pub(crate) files: Mutex<Vec<SentFile>>,
    pub(crate) fail_uploads: bool,
}

impl RecordingTransport {
    pub(crate) fn failing() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.texts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub(crate) fn files(&self) -> Vec<SentFile> {
        self.files.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, requester: RequesterId, text: &str) -> Result<(), String> {
        self.texts
            .lock()
            .unwrap()
            .push((requester, text.to_string()));
        Ok(())
    }

    async fn send_file(
        &self,
        requester: RequesterId,
        artifact: &StagedArtifact,
        caption: &str,
    ) -> Result<(), String> {
        self.files.lock().unwrap().push(SentFile {
            requester,
            path: artifact.path.clone(),
            size_bytes: artifact.size_bytes,
            existed_during_send: artifact.path.exists(),
            caption: caption.to_string(),
        });
        if self.fail_uploads {
            Err("upload refused".to_string())
        } else {
            Ok(())
        }
    }
}

/// Configuration with fast retries rooted in `root`
pub(crate) fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.staging.download_dir = root.join("downloads");
    config.staging.max_artifact_size = 1024;
    config.lock_path = root.join("media-fetch.lock");
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(5);
    config.retry.jitter = false;
    config.retry.attempt_timeout = Duration::from_secs(5);
    config
}

/// Helper to create a test MediaFetcher around a scripted extractor.
/// Returns the fetcher, the extractor and the tempdir (which must be kept alive).
pub(crate) async fn create_test_fetcher(
    steps: Vec<Step>,
) -> (MediaFetcher, Arc<ScriptedExtractor>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let extractor = Arc::new(ScriptedExtractor::new(steps));
    let fetcher = MediaFetcher::new(test_config(temp_dir.path()), extractor.clone())
        .await
        .unwrap();
    (fetcher, extractor, temp_dir)
}
