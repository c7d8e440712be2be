//! Test configuration helpers for creating orchestrators over temporary directories

use media_fetch::{Config, MediaExtractor, MediaFetcher};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Configuration rooted in `temp_dir` with millisecond backoff
pub fn fast_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.staging.download_dir = temp_dir.path().join("downloads");
    config.lock_path = temp_dir.path().join("media-fetch.lock");
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(10);
    config.retry.jitter = false;
    config.retry.attempt_timeout = Duration::from_secs(10);
    config
}

/// Create an orchestrator with `config` around `extractor`
///
/// Returns the fetcher and the temp dir (which must be kept alive).
pub async fn create_fetcher_with(
    extractor: Arc<dyn MediaExtractor>,
    adjust: impl FnOnce(&mut Config),
) -> (MediaFetcher, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(&temp_dir);
    adjust(&mut config);
    let fetcher = MediaFetcher::new(config, extractor).await.unwrap();
    (fetcher, temp_dir)
}

/// Create an orchestrator with default test configuration
pub async fn create_fetcher(extractor: Arc<dyn MediaExtractor>) -> (MediaFetcher, TempDir) {
    create_fetcher_with(extractor, |_| {}).await
}
