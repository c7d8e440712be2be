//! Fetch retry engine
//!
//! Drives a [`MediaExtractor`] through bounded attempts. Each attempt presents an
//! identity not used earlier in the sequence, runs under the per-attempt timeout,
//! and on failure leaves the staging directory empty for the next one.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

use crate::config::RetryConfig;
use crate::error::{ExtractorError, ExtractorErrorKind, FetchError, USER_EXCERPT_CHARS, excerpt};
use crate::extractor::{DownloadRequest, MediaExtractor};
use crate::identity::IdentityRotator;
use crate::retry::{IsRetryable, RetryFailure, with_retry};
use crate::staging::StagedDir;
use crate::types::{AttemptOutcome, Event, FetchAttempt, MediaKind, MediaMetadata};

/// A successful fetch: the produced file and the attempts it took
#[derive(Clone, Debug)]
pub struct FetchedArtifact {
    /// Path reported by the extractor
    pub path: PathBuf,
    /// Every attempt made, the last one being the success
    pub attempts: Vec<FetchAttempt>,
}

/// Retrying front-end to the extraction capability
#[derive(Clone)]
pub struct FetchEngine {
    extractor: Arc<dyn MediaExtractor>,
    rotator: IdentityRotator,
    retry: RetryConfig,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl FetchEngine {
    /// Create an engine around `extractor`
    pub fn new(extractor: Arc<dyn MediaExtractor>, rotator: IdentityRotator, retry: RetryConfig) -> Self {
        Self {
            extractor,
            rotator,
            retry,
            event_tx: None,
        }
    }

    /// Publish an [`Event::AttemptFailed`] for every failed attempt
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Name of the underlying extractor
    pub fn extractor_name(&self) -> &'static str {
        self.extractor.name()
    }

    /// Best-effort metadata lookup
    ///
    /// Bounded by the attempt timeout and never fails: errors are logged and
    /// replaced by placeholder metadata.
    pub async fn probe_metadata(&self, url: &str, kind: MediaKind) -> MediaMetadata {
        let identity = self.rotator.next_profile();
        let lookup = self.extractor.extract_metadata(url, kind, &identity);

        match tokio::time::timeout(self.retry.attempt_timeout, lookup).await {
            Ok(Ok(meta)) => meta,
            Ok(Err(e)) => {
                tracing::warn!(url, error = %e, "metadata lookup failed, using placeholder");
                MediaMetadata::placeholder(kind)
            }
            Err(_) => {
                tracing::warn!(url, "metadata lookup timed out, using placeholder");
                MediaMetadata::placeholder(kind)
            }
        }
    }

    /// Fetch `url` as `kind` into `staging`
    ///
    /// Retryable failures (bot detection, throttling, network trouble, attempt
    /// timeouts) are retried with backoff up to `max_attempts` in total. Anything
    /// else stops the sequence at once.
    ///
    /// # Errors
    ///
    /// [`FetchError::Fatal`] for a non-retryable failure, [`FetchError::Exhausted`]
    /// when every attempt failed.
    pub async fn fetch(
        &self,
        url: &str,
        kind: MediaKind,
        staging: &StagedDir,
    ) -> Result<FetchedArtifact, FetchError> {
        let attempts: Mutex<Vec<FetchAttempt>> = Mutex::new(Vec::new());

        let outcome = with_retry(&self.retry, |attempt_no| {
            let attempts = &attempts;
            async move {
                let used: Vec<String> = attempts
                    .lock()
                    .await
                    .iter()
                    .map(|a| a.user_agent.clone())
                    .collect();
                let identity = self.rotator.next_profile_avoiding(&used);
                let user_agent = identity.user_agent.clone();

                let request = DownloadRequest {
                    url: url.to_string(),
                    kind,
                    destination_dir: staging.path().to_path_buf(),
                    file_stem: staging.file_stem().to_string(),
                    identity,
                };

                tracing::debug!(url, attempt = attempt_no, user_agent = %user_agent, "fetch attempt");
                let result = self.attempt(&request).await;

                let record = match &result {
                    Ok(_) => FetchAttempt {
                        attempt_no,
                        user_agent,
                        outcome: AttemptOutcome::Success,
                        error_detail: None,
                    },
                    Err(e) => {
                        self.discard_partial(staging).await;
                        self.emit(Event::AttemptFailed {
                            attempt: attempt_no,
                            retryable: e.is_retryable(),
                            error: excerpt(&e.to_string(), USER_EXCERPT_CHARS),
                        });
                        FetchAttempt {
                            attempt_no,
                            user_agent,
                            outcome: if e.is_retryable() {
                                AttemptOutcome::RetryableFailure
                            } else {
                                AttemptOutcome::FatalFailure
                            },
                            error_detail: Some(e.to_string()),
                        }
                    }
                };
                attempts.lock().await.push(record);
                result
            }
        })
        .await;

        match outcome {
            Ok(path) => Ok(FetchedArtifact {
                path,
                attempts: attempts.into_inner(),
            }),
            Err(RetryFailure::Fatal { error, .. }) => Err(FetchError::Fatal(error)),
            Err(RetryFailure::Exhausted { attempts, last }) => {
                Err(FetchError::Exhausted { attempts, last })
            }
        }
    }

    /// One extractor call under the attempt timeout
    async fn attempt(&self, request: &DownloadRequest) -> Result<PathBuf, ExtractorError> {
        let timeout = self.retry.attempt_timeout;
        match tokio::time::timeout(timeout, self.extractor.download(request)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractorError::new(
                ExtractorErrorKind::NetworkTimeout,
                format!("attempt timed out after {}s", timeout.as_secs()),
            )),
        }
    }

    async fn discard_partial(&self, staging: &StagedDir) {
        if let Err(e) = staging.clear().await {
            tracing::warn!(
                dir = %staging.path().display(),
                error = %e,
                "failed to discard partial output"
            );
        }
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.event_tx {
            // No subscribers is fine
            tx.send(event).ok();
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::test_helpers::{ScriptedExtractor, Step};
    use crate::staging::StagingArea;
    use crate::types::HandleToken;
    use std::collections::HashSet;
    use std::time::Duration;

    fn retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
            attempt_timeout: Duration::from_secs(5),
        }
    }

    async fn staged(root: &tempfile::TempDir) -> StagedDir {
        StagingArea::new(root.path(), u64::MAX)
            .prepare(&HandleToken::from("tok"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn bot_detection_twice_then_success_uses_three_identities() {
        let root = tempfile::tempdir().unwrap();
        let dir = staged(&root).await;
        let extractor = Arc::new(ScriptedExtractor::new(vec![
            Step::Fail(ExtractorErrorKind::BotDetection),
            Step::Fail(ExtractorErrorKind::BotDetection),
            Step::Produce { ext: "mp4", bytes: 64 },
        ]));
        let engine = FetchEngine::new(extractor.clone(), IdentityRotator::default(), retry(3));

        let fetched = engine.fetch("https://youtu.be/abc", MediaKind::Video, &dir).await.unwrap();

        assert_eq!(fetched.attempts.len(), 3);
        assert_eq!(fetched.attempts[2].outcome, AttemptOutcome::Success);
        assert_eq!(fetched.attempts[0].outcome, AttemptOutcome::RetryableFailure);
        let agents: HashSet<_> = extractor.seen_user_agents().into_iter().collect();
        assert_eq!(agents.len(), 3, "each attempt must present a distinct identity");
        assert!(fetched.path.exists());
    }

    #[tokio::test]
    async fn fatal_error_stops_after_one_attempt() {
        let root = tempfile::tempdir().unwrap();
        let dir = staged(&root).await;
        let extractor = Arc::new(ScriptedExtractor::new(vec![
            Step::Fail(ExtractorErrorKind::UnsupportedContent),
            Step::Produce { ext: "mp4", bytes: 1 },
        ]));
        let engine = FetchEngine::new(extractor.clone(), IdentityRotator::default(), retry(3));

        let err = engine.fetch("https://youtu.be/abc", MediaKind::Video, &dir).await.unwrap_err();

        assert!(matches!(err, FetchError::Fatal(ref e) if e.kind == ExtractorErrorKind::UnsupportedContent));
        assert_eq!(extractor.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_report_last_error() {
        let root = tempfile::tempdir().unwrap();
        let dir = staged(&root).await;
        let extractor = Arc::new(ScriptedExtractor::new(vec![
            Step::Fail(ExtractorErrorKind::RateLimited),
            Step::Fail(ExtractorErrorKind::NetworkTimeout),
        ]));
        let engine = FetchEngine::new(extractor.clone(), IdentityRotator::default(), retry(2));

        let err = engine.fetch("https://youtu.be/abc", MediaKind::Audio, &dir).await.unwrap_err();

        match err {
            FetchError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert_eq!(last.kind, ExtractorErrorKind::NetworkTimeout);
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(extractor.calls(), 2);
    }

    #[tokio::test]
    async fn partial_output_is_discarded_between_attempts() {
        let root = tempfile::tempdir().unwrap();
        let dir = staged(&root).await;
        let extractor = Arc::new(ScriptedExtractor::new(vec![
            Step::FailWithPartial(ExtractorErrorKind::NetworkTimeout),
            Step::FailWithPartial(ExtractorErrorKind::NotFound),
        ]));
        let engine = FetchEngine::new(extractor.clone(), IdentityRotator::default(), retry(3));

        engine.fetch("https://youtu.be/abc", MediaKind::Video, &dir).await.unwrap_err();

        assert_eq!(extractor.calls(), 2);
        assert_eq!(
            extractor.dir_was_empty_on_entry(),
            vec![true, true],
            "each attempt must start from a clean directory"
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn hung_attempt_times_out_and_is_retried() {
        let root = tempfile::tempdir().unwrap();
        let dir = staged(&root).await;
        let extractor = Arc::new(ScriptedExtractor::new(vec![
            Step::Hang,
            Step::Produce { ext: "mp3", bytes: 8 },
        ]));
        let config = RetryConfig {
            attempt_timeout: Duration::from_millis(50),
            ..retry(3)
        };
        let engine = FetchEngine::new(extractor.clone(), IdentityRotator::default(), config);

        let fetched = engine.fetch("https://youtu.be/abc", MediaKind::Audio, &dir).await.unwrap();

        assert_eq!(fetched.attempts.len(), 2);
        assert_eq!(fetched.attempts[0].outcome, AttemptOutcome::RetryableFailure);
        assert!(
            fetched.attempts[0]
                .error_detail
                .as_deref()
                .unwrap()
                .contains("timed out")
        );
    }

    #[tokio::test]
    async fn failed_attempts_are_published() {
        let root = tempfile::tempdir().unwrap();
        let dir = staged(&root).await;
        let (tx, mut rx) = broadcast::channel(16);
        let extractor = Arc::new(ScriptedExtractor::new(vec![
            Step::Fail(ExtractorErrorKind::BotDetection),
            Step::Produce { ext: "mp4", bytes: 1 },
        ]));
        let engine =
            FetchEngine::new(extractor, IdentityRotator::default(), retry(3)).with_events(tx);

        engine.fetch("https://youtu.be/abc", MediaKind::Video, &dir).await.unwrap();

        match rx.try_recv().unwrap() {
            Event::AttemptFailed { attempt, retryable, .. } => {
                assert_eq!(attempt, 1);
                assert!(retryable);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err(), "success publishes nothing here");
    }

    #[tokio::test]
    async fn metadata_failure_degrades_to_placeholder() {
        let extractor = Arc::new(ScriptedExtractor::new(Vec::new()));
        let engine = FetchEngine::new(extractor, IdentityRotator::default(), retry(1));
        let meta = engine.probe_metadata("https://youtu.be/abc", MediaKind::Audio).await;
        assert_eq!(meta, MediaMetadata::placeholder(MediaKind::Audio));
    }
}
