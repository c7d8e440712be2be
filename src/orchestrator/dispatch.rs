//! Fetch, stage and deliver for a selected action.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use chrono::Utc;

use crate::error::{DeliveryError, Error, Result, UserFacing};
use crate::handles::RequestHandle;
use crate::types::{DeliveredArtifact, Event, HandleToken, MediaKind, RequesterId};

use super::{MediaFetcher, Transport};

/// Counts a running dispatch for the lifetime of the guard
struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MediaFetcher {
    /// Run the selected action for a handle and deliver the file through `transport`
    ///
    /// The handle is consumed before any network work starts, so a duplicate
    /// selection of the same token gets [`Error::HandleNotFound`]. A handle issued to
    /// another requester is reported as not found as well.
    ///
    /// Staged files are removed on every path, including when shutdown interrupts
    /// the dispatch.
    pub async fn dispatch(
        &self,
        requester: RequesterId,
        token: &HandleToken,
        kind: MediaKind,
        transport: &dyn Transport,
    ) -> Result<DeliveredArtifact> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }

        let handle = self.handles.take(token, requester, Instant::now()).await?;
        let _in_flight = InFlightGuard::enter(&self.lifecycle.in_flight);

        tracing::info!(requester = %requester, token = %token, kind = %kind, "dispatch started");
        self.emit(Event::Dispatched { requester, kind });

        let result = tokio::select! {
            result = self.run_dispatch(&handle, kind, transport) => result,
            _ = self.lifecycle.shutdown.cancelled() => {
                tracing::warn!(token = %token, "dispatch interrupted by shutdown");
                Err(Error::ShuttingDown)
            }
        };

        match &result {
            Ok(delivered) => {
                tracing::info!(
                    requester = %requester,
                    kind = %kind,
                    size_bytes = delivered.size_bytes,
                    attempts = delivered.attempts,
                    "artifact delivered"
                );
                self.emit(Event::Delivered {
                    requester,
                    kind,
                    size_bytes: delivered.size_bytes,
                    at: Utc::now(),
                });
            }
            Err(e) => {
                tracing::error!(
                    requester = %requester,
                    token = %token,
                    url = %handle.original_url,
                    code = e.error_code(),
                    error = %e,
                    "dispatch failed"
                );
                self.emit(Event::Failed {
                    requester,
                    kind,
                    code: e.error_code().to_string(),
                });
            }
        }

        result
    }

    async fn run_dispatch(
        &self,
        handle: &RequestHandle,
        kind: MediaKind,
        transport: &dyn Transport,
    ) -> Result<DeliveredArtifact> {
        let url = handle.original_url.as_str();
        let requester = handle.requester_id;
        let limit = self.staging.max_artifact_size();

        let metadata = self.engine.probe_metadata(url, kind).await;
        // Audio is transcoded after download, so only the measured size counts
        if kind == MediaKind::Video
            && let Some(estimate) = metadata.size_estimate
            && estimate > limit
        {
            return Err(DeliveryError::ArtifactTooLarge {
                size: estimate,
                limit,
            }
            .into());
        }

        let dir = self.staging.prepare(&handle.token).await?;
        let fetched = self.engine.fetch(url, kind, &dir).await?;
        let attempts = u32::try_from(fetched.attempts.len()).unwrap_or(u32::MAX);

        let caption = metadata.caption();
        let artifact = self
            .staging
            .stage_and_deliver(dir, Some(&fetched.path), kind, move |artifact| async move {
                transport.send_file(requester, &artifact, &caption).await
            })
            .await?;

        Ok(DeliveredArtifact {
            kind,
            size_bytes: artifact.size_bytes,
            file_name: artifact
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            attempts,
        })
    }
}
