//! Chat transport seam.
//!
//! The orchestrator does not know how messages reach people. A [`Transport`]
//! sends text and files; the glue here turns inbound text into submissions and
//! inbound selections (`video_<token>` / `audio_<token>`) into dispatches, and
//! replies with the user-facing outcome.

use async_trait::async_trait;

use crate::error::UserFacing;
use crate::types::{DeliveredArtifact, HandleToken, MediaKind, RequesterId, StagedArtifact, Submission};

use super::MediaFetcher;

/// Outbound side of a chat transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a text message to `requester`
    async fn send_text(&self, requester: RequesterId, text: &str) -> Result<(), String>;

    /// Upload a staged file to `requester`
    ///
    /// The file is deleted as soon as this returns, so implementations must finish
    /// reading it before returning.
    async fn send_file(
        &self,
        requester: RequesterId,
        artifact: &StagedArtifact,
        caption: &str,
    ) -> Result<(), String>;
}

/// Callback payload selecting `kind` for `token`
pub fn selection_data(kind: MediaKind, token: &HandleToken) -> String {
    format!("{}_{}", kind.as_str(), token)
}

/// Parse a callback payload produced by [`selection_data`]
pub fn parse_selection(data: &str) -> Option<(MediaKind, HandleToken)> {
    let (kind, token) = data.trim().split_once('_')?;
    let kind = kind.parse().ok()?;
    let token = HandleToken::new(token);
    token.is_path_safe().then_some((kind, token))
}

impl MediaFetcher {
    /// Handle an inbound text message
    ///
    /// Replies with the action choices for an accepted link, or with the
    /// user-facing error otherwise.
    pub async fn handle_message(
        &self,
        requester: RequesterId,
        text: &str,
        transport: &dyn Transport,
    ) -> Option<Submission> {
        match self.submit(requester, text).await {
            Ok(submission) => {
                let reply = format!(
                    "{} link received.\n\nChoose a format:\n  Video: {}\n  Audio: {}",
                    submission.platform,
                    selection_data(MediaKind::Video, &submission.token),
                    selection_data(MediaKind::Audio, &submission.token),
                );
                reply_or_log(transport, requester, &reply).await;
                Some(submission)
            }
            Err(e) => {
                tracing::debug!(requester = %requester, code = e.error_code(), "submission rejected");
                reply_or_log(transport, requester, &e.user_message()).await;
                None
            }
        }
    }

    /// Handle an inbound action selection
    ///
    /// Malformed payloads get a short notice. Failures are reported with their
    /// user-facing message; a successful delivery speaks for itself.
    pub async fn handle_selection(
        &self,
        requester: RequesterId,
        data: &str,
        transport: &dyn Transport,
    ) -> Option<DeliveredArtifact> {
        let Some((kind, token)) = parse_selection(data) else {
            reply_or_log(transport, requester, "Unknown action. Please send the link again.").await;
            return None;
        };

        reply_or_log(transport, requester, &format!("Downloading {kind}...")).await;

        match self.dispatch(requester, &token, kind, transport).await {
            Ok(delivered) => Some(delivered),
            Err(e) => {
                reply_or_log(transport, requester, &e.user_message()).await;
                None
            }
        }
    }
}

async fn reply_or_log(transport: &dyn Transport, requester: RequesterId, text: &str) {
    if let Err(e) = transport.send_text(requester, text).await {
        tracing::warn!(requester = %requester, error = %e, "failed to send reply");
    }
}
