//! Media fetch orchestrator split into focused submodules.
//!
//! The `MediaFetcher` struct and its methods are organized by domain:
//! - [`submit`] - Link admission and handle issue
//! - [`dispatch`] - Fetch, stage and deliver for a selected action
//! - [`transport`] - Chat transport seam and message/selection glue
//! - [`lifecycle`] - Background sweeping and shutdown coordination

mod dispatch;
mod lifecycle;
mod submit;
mod transport;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use transport::{Transport, parse_selection, selection_data};

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extractor::{self, MediaExtractor};
use crate::fetch::FetchEngine;
use crate::handles::HandleRegistry;
use crate::identity::IdentityRotator;
use crate::lock::InstanceLock;
use crate::platform::PlatformRegistry;
use crate::rate_limit::RateLimiter;
use crate::staging::StagingArea;
use crate::types::Event;

/// Shutdown coordination state
#[derive(Clone)]
pub(crate) struct LifecycleState {
    /// Cancelled when shutdown starts; in-flight dispatches and the sweeper watch it
    pub(crate) shutdown: tokio_util::sync::CancellationToken,
    /// Background sweeper task, if started
    pub(crate) sweeper: Arc<tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>>,
    /// Number of dispatches currently running
    pub(crate) in_flight: Arc<AtomicUsize>,
    /// Instance lock held for the lifetime of this orchestrator
    pub(crate) instance_lock: Arc<tokio::sync::Mutex<Option<InstanceLock>>>,
}

/// Main orchestrator instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaFetcher {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Allow-listed platforms
    pub(crate) platforms: Arc<PlatformRegistry>,
    /// Per-requester admission control
    pub(crate) rate_limiter: Arc<RateLimiter>,
    /// Pending handles
    pub(crate) handles: Arc<HandleRegistry>,
    /// Retrying extractor front-end
    pub(crate) engine: Arc<FetchEngine>,
    /// Per-request staging directories and size ceiling
    pub(crate) staging: Arc<StagingArea>,
    /// Shutdown coordination
    pub(crate) lifecycle: LifecycleState,
}

impl MediaFetcher {
    /// Create a new orchestrator around `extractor`
    ///
    /// Validates the configuration and creates the download directory. The
    /// background sweeper is not started; call [`start_sweeper`](Self::start_sweeper).
    pub async fn new(config: Config, extractor: Arc<dyn MediaExtractor>) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.staging.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.staging.download_dir.display(),
                        e
                    ),
                ))
            })?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let engine = FetchEngine::new(
            extractor,
            IdentityRotator::default(),
            config.retry.clone(),
        )
        .with_events(event_tx.clone());

        tracing::info!(
            extractor = engine.extractor_name(),
            download_dir = %config.staging.download_dir.display(),
            "media fetcher initialized"
        );

        Ok(Self {
            platforms: Arc::new(PlatformRegistry::from_config(&config.platforms)),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            handles: Arc::new(HandleRegistry::new(config.handles.clone())),
            engine: Arc::new(engine),
            staging: Arc::new(StagingArea::new(
                config.staging.download_dir.clone(),
                config.staging.max_artifact_size,
            )),
            lifecycle: LifecycleState {
                shutdown: tokio_util::sync::CancellationToken::new(),
                sweeper: Arc::new(tokio::sync::Mutex::new(None)),
                in_flight: Arc::new(AtomicUsize::new(0)),
                instance_lock: Arc::new(tokio::sync::Mutex::new(None)),
            },
            event_tx,
            config: Arc::new(config),
        })
    }

    /// Create an orchestrator with the extractor selected by `config.extractor`
    pub async fn from_config(config: Config) -> Result<Self> {
        let extractor = extractor::from_config(&config.extractor);
        Self::new(config, extractor).await
    }

    /// Hand the instance lock to the orchestrator; it is released on [`shutdown`](Self::shutdown)
    pub async fn with_lock(self, lock: InstanceLock) -> Self {
        *self.lifecycle.instance_lock.lock().await = Some(lock);
        self
    }

    /// Subscribe to orchestrator events
    ///
    /// Each subscriber receives every event sent after it subscribed. Slow
    /// subscribers lag and miss events rather than blocking the orchestrator.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Display names of the allow-listed platforms
    pub fn platform_names(&self) -> Vec<String> {
        self.platforms
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Whether shutdown has started
    pub fn is_shutting_down(&self) -> bool {
        self.lifecycle.shutdown.is_cancelled()
    }

    /// Number of pending (unconsumed) handles
    pub async fn pending_handles(&self) -> usize {
        self.handles.len().await
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}
