//! Background sweeping and shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::types::Event;

use super::MediaFetcher;

/// How long shutdown waits for interrupted dispatches to unwind
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

impl MediaFetcher {
    /// Start the background task that drops expired handles and idle rate windows
    ///
    /// Runs every `handles.sweep_interval` until shutdown. Calling it again while
    /// a sweeper is running has no effect.
    pub async fn start_sweeper(&self) {
        let mut slot = self.lifecycle.sweeper.lock().await;
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let fetcher = self.clone();
        let period = self.config.handles.sweep_interval;
        let shutdown = self.lifecycle.shutdown.clone();

        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        fetcher.sweep(Instant::now()).await;
                    }
                }
            }
        }));
        tracing::debug!(period_secs = period.as_secs(), "sweeper started");
    }

    /// One sweep pass; returns `(expired handles, idle requesters)` removed
    pub async fn sweep(&self, now: Instant) -> (usize, usize) {
        let handles = self.handles.sweep_expired(now).await;
        let windows = self.rate_limiter.purge_idle(now).await;
        if handles > 0 || windows > 0 {
            tracing::debug!(handles, windows, "sweep removed stale entries");
        }
        (handles, windows)
    }

    /// Gracefully shut down the orchestrator
    ///
    /// 1. Stops accepting submissions and dispatches
    /// 2. Interrupts in-flight dispatches (their staged files are removed)
    /// 3. Stops the sweeper
    /// 4. Releases the instance lock, if one was handed over
    ///
    /// Calling it more than once is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be removed. The lock itself is
    /// released regardless.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");
        self.lifecycle.shutdown.cancel();

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while self.lifecycle.in_flight.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                in_flight = self.lifecycle.in_flight.load(Ordering::SeqCst),
                "Timeout waiting for dispatches to unwind, proceeding with shutdown"
            );
        }

        if let Some(task) = self.lifecycle.sweeper.lock().await.take()
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "sweeper task ended abnormally");
        }

        self.emit(Event::Shutdown);

        let lock = self.lifecycle.instance_lock.lock().await.take();
        if let Some(lock) = lock {
            lock.release()?;
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
