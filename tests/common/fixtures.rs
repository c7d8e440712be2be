//! Stub collaborators: a scripted extractor and a recording transport

use async_trait::async_trait;
use media_fetch::extractor::{DownloadRequest, MediaExtractor};
use media_fetch::identity::IdentityProfile;
use media_fetch::{
    ExtractorError, ExtractorErrorKind, MediaKind, MediaMetadata, RequesterId, StagedArtifact,
    Transport,
};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted behaviour of one download call
#[derive(Clone, Debug)]
pub enum Outcome {
    /// Fail with the given kind
    Fail(ExtractorErrorKind),
    /// Write `<stem>.<ext>` of `bytes` bytes
    Produce(&'static str, usize),
    /// Sleep, then produce an mp4 of `bytes` bytes
    SlowProduce(Duration, usize),
}

/// One call as seen by the stub
#[derive(Clone, Debug)]
pub struct RecordedCall {
    /// Link passed in
    pub url: String,
    /// Directory the file had to go to
    pub destination_dir: PathBuf,
    /// User-Agent presented
    pub user_agent: String,
}

/// Extractor following a script; when the script runs out it keeps producing
/// small mp4 files
pub struct StubExtractor {
    script: Mutex<VecDeque<Outcome>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl StubExtractor {
    /// Create a stub with the given script
    pub fn new(script: Vec<Outcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Stub that always succeeds
    pub fn always_succeeding() -> Self {
        Self::new(Vec::new())
    }

    /// Calls made so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaExtractor for StubExtractor {
    async fn extract_metadata(
        &self,
        _url: &str,
        _kind: MediaKind,
        _identity: &IdentityProfile,
    ) -> Result<MediaMetadata, ExtractorError> {
        Ok(MediaMetadata {
            title: "Stub clip".to_string(),
            duration_secs: 42,
            uploader: "stub".to_string(),
            size_estimate: None,
        })
    }

    async fn download(&self, request: &DownloadRequest) -> Result<PathBuf, ExtractorError> {
        self.calls.lock().unwrap().push(RecordedCall {
            url: request.url.clone(),
            destination_dir: request.destination_dir.clone(),
            user_agent: request.identity.user_agent.clone(),
        });

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Produce("mp4", 16));

        let (ext, bytes) = match outcome {
            Outcome::Fail(kind) => {
                return Err(ExtractorError::new(kind, format!("stubbed {kind}")));
            }
            Outcome::Produce(ext, bytes) => (ext, bytes),
            Outcome::SlowProduce(delay, bytes) => {
                tokio::time::sleep(delay).await;
                ("mp4", bytes)
            }
        };

        let path = request
            .destination_dir
            .join(format!("{}.{}", request.file_stem, ext));
        tokio::fs::write(&path, vec![7u8; bytes]).await.unwrap();
        Ok(path)
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// A file handed to the transport
#[derive(Clone, Debug)]
pub struct Upload {
    /// Recipient
    pub requester: RequesterId,
    /// Path at upload time
    pub path: PathBuf,
    /// Size reported by the orchestrator
    pub size_bytes: u64,
    /// Bytes actually readable during the upload
    pub readable_bytes: u64,
}

/// Transport that records messages and uploads
#[derive(Default)]
pub struct RecordingTransport {
    messages: Mutex<Vec<(RequesterId, String)>>,
    uploads: Mutex<Vec<Upload>>,
    refuse_uploads: bool,
}

impl RecordingTransport {
    /// Transport whose uploads always fail
    pub fn refusing() -> Self {
        Self {
            refuse_uploads: true,
            ..Self::default()
        }
    }

    /// Text messages sent so far
    pub fn messages(&self) -> Vec<(RequesterId, String)> {
        self.messages.lock().unwrap().clone()
    }

    /// Uploads attempted so far
    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, requester: RequesterId, text: &str) -> Result<(), String> {
        self.messages
            .lock()
            .unwrap()
            .push((requester, text.to_string()));
        Ok(())
    }

    async fn send_file(
        &self,
        requester: RequesterId,
        artifact: &StagedArtifact,
        _caption: &str,
    ) -> Result<(), String> {
        let readable_bytes = tokio::fs::read(&artifact.path)
            .await
            .map(|b| b.len() as u64)
            .unwrap_or(0);
        self.uploads.lock().unwrap().push(Upload {
            requester,
            path: artifact.path.clone(),
            size_bytes: artifact.size_bytes,
            readable_bytes,
        });
        if self.refuse_uploads {
            Err("refused by test transport".to_string())
        } else {
            Ok(())
        }
    }
}
