//! # media-fetch
//!
//! Rate-limited media fetch orchestrator for chat bots.
//!
//! A requester sends a link; the orchestrator checks it against the platform
//! allow-list, admits it through a per-requester sliding window, and hands back a
//! short-lived token. When the requester picks an action for that token, the link
//! is fetched through an external extractor (yt-dlp) with retries, identity
//! rotation and backoff, checked against a size ceiling, and handed to the chat
//! transport. Staged files never outlive their request.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - The chat transport and the extractor are traits
//! - **Defaults that run** - A missing config file means the documented defaults
//! - **Observable** - Outcomes are broadcast as [`Event`]s
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_fetch::{Config, InstanceLock, MediaFetcher, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let lock = InstanceLock::acquire(&config.lock_path)?;
//!
//!     let fetcher = MediaFetcher::from_config(config).await?.with_lock(lock).await;
//!     fetcher.start_sweeper().await;
//!
//!     // Feed events to a statistics collector
//!     let mut events = fetcher.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             tracing::debug!(?event, "orchestrator event");
//!         }
//!     });
//!
//!     run_with_shutdown(fetcher).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Media extraction capability
pub mod extractor;
/// Fetch retry engine
pub mod fetch;
/// Link handles
pub mod handles;
/// Client identity rotation
pub mod identity;
/// Process-wide instance lock
pub mod lock;
/// Orchestrator (decomposed into focused submodules)
pub mod orchestrator;
/// Platform allow-list
pub mod platform;
/// Sliding-window admission control
pub mod rate_limit;
/// Retry logic with exponential backoff
pub mod retry;
/// Staging and delivery
pub mod staging;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{DeliveryError, Error, ExtractorError, ExtractorErrorKind, FetchError, Result, UserFacing};
pub use extractor::{CliExtractor, MediaExtractor, UnavailableExtractor};
pub use lock::InstanceLock;
pub use orchestrator::{MediaFetcher, Transport};
pub use types::{
    DeliveredArtifact, Event, HandleToken, MediaKind, MediaMetadata, RequesterId, StagedArtifact,
    Submission,
};

/// Helper function to run the orchestrator with graceful signal handling.
///
/// Waits for a termination signal and then calls the orchestrator's `shutdown()`
/// method, which interrupts in-flight dispatches (removing their staged files) and
/// releases the instance lock.
///
/// On Unix both SIGTERM and SIGINT trigger the shutdown; elsewhere only Ctrl+C does.
///
/// # Example
///
/// ```no_run
/// use media_fetch::{Config, MediaFetcher, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let fetcher = MediaFetcher::from_config(Config::default()).await?;
///
///     run_with_shutdown(fetcher).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(fetcher: MediaFetcher) -> Result<()> {
    wait_for_signal().await;
    fetcher.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments; a failed source never fires
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending().await
            }
        }
    };
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                tracing::warn!(error = %e, "SIGINT handler unavailable");
                std::future::pending().await
            }
        }
    };

    let received = tokio::select! {
        name = terminate => name,
        name = interrupt => name,
    };
    tracing::info!(signal = received, "shutdown signal received");
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl+C, shutting down now");
        return;
    }
    tracing::info!(signal = "Ctrl+C", "shutdown signal received");
}
