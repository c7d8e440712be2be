//! Short-lived handles standing in for submitted links
//!
//! A link is exchanged for a random alphanumeric token small enough to fit into a
//! chat callback payload. Handles expire after the configured TTL and are removed
//! either when consumed by a dispatch or by the periodic sweep.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::config::HandleConfig;
use crate::error::{Error, Result};
use crate::types::{HandleToken, RequesterId};

/// A pending request waiting for the requester to pick an action
#[derive(Clone, Debug)]
pub struct RequestHandle {
    /// Token presented back by the requester
    pub token: HandleToken,
    /// The submitted link
    pub original_url: String,
    /// Who submitted it
    pub requester_id: RequesterId,
    /// Monotonic creation time, used for expiry
    pub created_at: Instant,
    /// Wall-clock creation time, for logs and events
    pub issued_at: DateTime<Utc>,
}

impl RequestHandle {
    /// Whether the handle is past `ttl` at `now`
    pub fn is_expired(&self, now: Instant, ttl: std::time::Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}

/// In-memory registry of pending handles
pub struct HandleRegistry {
    handles: Mutex<HashMap<HandleToken, RequestHandle>>,
    config: HandleConfig,
}

impl HandleRegistry {
    /// Create an empty registry
    pub fn new(config: HandleConfig) -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Store `url` for `requester` and return a fresh token
    ///
    /// Tokens are regenerated until unique among live handles, so two
    /// submissions of the same link get independent handles.
    pub async fn issue(&self, url: &str, requester: RequesterId, now: Instant) -> HandleToken {
        let mut handles = self.handles.lock().await;
        let token = loop {
            let candidate = generate_token(self.config.token_length);
            if !handles.contains_key(&candidate) {
                break candidate;
            }
        };

        handles.insert(
            token.clone(),
            RequestHandle {
                token: token.clone(),
                original_url: url.to_string(),
                requester_id: requester,
                created_at: now,
                issued_at: Utc::now(),
            },
        );

        tracing::debug!(token = %token, requester = %requester, "handle issued");
        token
    }

    /// Look up a handle without removing it
    ///
    /// Returns [`Error::HandleExpired`] once the TTL has passed, even if the sweep
    /// has not run yet, and [`Error::HandleNotFound`] for unknown tokens.
    pub async fn resolve(&self, token: &HandleToken, now: Instant) -> Result<(String, RequesterId)> {
        let handles = self.handles.lock().await;
        let handle = handles.get(token).ok_or(Error::HandleNotFound)?;
        if handle.is_expired(now, self.config.ttl) {
            return Err(Error::HandleExpired);
        }
        Ok((handle.original_url.clone(), handle.requester_id))
    }

    /// Remove a handle, returning it if it was present
    pub async fn consume(&self, token: &HandleToken) -> Option<RequestHandle> {
        self.handles.lock().await.remove(token)
    }

    /// Resolve and remove in one step, so concurrent dispatches of the same token
    /// cannot both succeed
    ///
    /// A handle owned by a different requester is left in place and reported as
    /// [`Error::HandleNotFound`]. Expired handles are removed.
    pub async fn take(
        &self,
        token: &HandleToken,
        requester: RequesterId,
        now: Instant,
    ) -> Result<RequestHandle> {
        let mut handles = self.handles.lock().await;
        let handle = handles.get(token).ok_or(Error::HandleNotFound)?;
        if handle.requester_id != requester {
            return Err(Error::HandleNotFound);
        }
        if handle.is_expired(now, self.config.ttl) {
            handles.remove(token);
            return Err(Error::HandleExpired);
        }
        handles.remove(token).ok_or(Error::HandleNotFound)
    }

    /// Drop every handle past its TTL, returning how many were removed
    pub async fn sweep_expired(&self, now: Instant) -> usize {
        let ttl = self.config.ttl;
        let mut handles = self.handles.lock().await;
        let before = handles.len();
        handles.retain(|_, h| !h.is_expired(now, ttl));
        let removed = before - handles.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = handles.len(), "expired handles swept");
        }
        removed
    }

    /// Number of live (possibly expired but unswept) handles
    pub async fn len(&self) -> usize {
        self.handles.lock().await.len()
    }

    /// Whether the registry holds no handles
    pub async fn is_empty(&self) -> bool {
        self.handles.lock().await.is_empty()
    }
}

fn generate_token(length: usize) -> HandleToken {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    HandleToken::new(token)
}
