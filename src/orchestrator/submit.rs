//! Link admission.

use std::time::Instant;

use crate::error::{Error, Result, USER_EXCERPT_CHARS, excerpt};
use crate::types::{Event, RequesterId, Submission};

use super::MediaFetcher;

impl MediaFetcher {
    /// Accept a link from `requester` and issue a handle for it
    ///
    /// The allow-list is checked before admission, so an unsupported link does not
    /// count against the requester's quota.
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] once shutdown has started
    /// - [`Error::UnsupportedSource`] for links outside the allow-list
    /// - [`Error::AdmissionDenied`] when the requester is over quota
    pub async fn submit(&self, requester: RequesterId, text: &str) -> Result<Submission> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }

        let url = text.trim();
        let platform = self
            .platforms
            .match_url(url)
            .map(|p| p.name.clone())
            .ok_or_else(|| Error::UnsupportedSource(excerpt(url, USER_EXCERPT_CHARS)))?;

        let now = Instant::now();
        if let Some(retry_after) = self.rate_limiter.check(requester, now).await {
            tracing::info!(
                requester = %requester,
                retry_after_secs = retry_after.as_secs(),
                "admission denied"
            );
            return Err(Error::AdmissionDenied { retry_after });
        }

        let token = self.handles.issue(url, requester, now).await;
        tracing::info!(requester = %requester, platform = %platform, token = %token, "link accepted");

        self.emit(Event::Submitted {
            requester,
            platform: platform.clone(),
        });

        Ok(Submission {
            token,
            url: url.to_string(),
            platform,
        })
    }
}
