//! Console front-end for trying the orchestrator without a chat platform
//!
//! Paste a link to submit it, then type `video <token>` or `audio <token>` to
//! fetch it. Delivered files are reported with their size instead of being sent.
//!
//! ```text
//! cargo run --example console -- [config.json]
//! ```
//!
//! The config path may also come from `MEDIA_FETCH_CONFIG`. Set `RUST_LOG` to
//! adjust logging (default: `media_fetch=info`).

use async_trait::async_trait;
use media_fetch::{
    Config, Error, InstanceLock, MediaFetcher, RequesterId, StagedArtifact, Transport,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// The single local user
const CONSOLE_USER: RequesterId = RequesterId(1);

struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_text(&self, _requester: RequesterId, text: &str) -> Result<(), String> {
        println!("{text}\n");
        Ok(())
    }

    async fn send_file(
        &self,
        _requester: RequesterId,
        artifact: &StagedArtifact,
        caption: &str,
    ) -> Result<(), String> {
        println!(
            "[{} file, {} bytes: {}]\n{caption}\n",
            artifact.kind,
            artifact.size_bytes,
            artifact.path.display()
        );
        Ok(())
    }
}

fn load_config() -> Result<Config, Error> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MEDIA_FETCH_CONFIG").ok())
        .map(PathBuf::from);

    match path {
        Some(path) => Config::from_json_file(&path),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("media_fetch=info")),
        )
        .init();

    let config = load_config()?;

    let lock = match InstanceLock::acquire(&config.lock_path) {
        Ok(lock) => lock,
        Err(e @ Error::LockUnavailable { .. }) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let fetcher = MediaFetcher::from_config(config).await?.with_lock(lock).await;
    fetcher.start_sweeper().await;

    println!(
        "Supported platforms: {}\nSend a link, or `video <token>` / `audio <token>`.\n",
        fetcher.platform_names().join(", ")
    );

    let transport = ConsoleTransport;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match line.split_once(' ') {
                    Some((action @ ("video" | "audio"), token)) => {
                        let data = format!("{action}_{}", token.trim());
                        fetcher.handle_selection(CONSOLE_USER, &data, &transport).await;
                    }
                    _ => {
                        fetcher.handle_message(CONSOLE_USER, line, &transport).await;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C signal");
                break;
            }
        }
    }

    fetcher.shutdown().await?;
    Ok(())
}
