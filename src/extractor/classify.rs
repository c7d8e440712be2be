//! Parsing of yt-dlp output

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::error::{ExtractorError, ExtractorErrorKind};
use crate::types::MediaMetadata;

/// Ordered rules; the first match wins
const RULES: &[(&str, ExtractorErrorKind)] = &[
    (
        r"(?i)sign in to confirm|not a bot|confirm your age|captcha|http error 403",
        ExtractorErrorKind::BotDetection,
    ),
    (
        r"(?i)http error 429|too many requests|rate.?limit",
        ExtractorErrorKind::RateLimited,
    ),
    (
        r"(?i)unsupported url|no video formats found|is not a valid url|requested format is not available",
        ExtractorErrorKind::UnsupportedContent,
    ),
    (
        r"(?i)http error 404|video unavailable|private video|has been removed|is not available|does not exist",
        ExtractorErrorKind::NotFound,
    ),
    (
        r"(?i)timed? ?out|connection (reset|refused|aborted)|temporary failure|network is unreachable|read operation|incompleteread|unable to download webpage",
        ExtractorErrorKind::NetworkTimeout,
    ),
];

static COMPILED: LazyLock<Vec<(Regex, ExtractorErrorKind)>> = LazyLock::new(|| {
    RULES
        .iter()
        .filter_map(|(pattern, kind)| Regex::new(pattern).ok().map(|re| (re, *kind)))
        .collect()
});

/// Classify extractor diagnostics into an [`ExtractorErrorKind`]
///
/// The message keeps the last `ERROR:` line when there is one, since yt-dlp
/// prints warnings before the actual failure.
pub fn classify_stderr(stderr: &str) -> ExtractorError {
    let kind = COMPILED
        .iter()
        .find(|(re, _)| re.is_match(stderr))
        .map(|(_, kind)| *kind)
        .unwrap_or(ExtractorErrorKind::Unknown);

    let message = stderr
        .lines()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().find(|line| !line.trim().is_empty()))
        .unwrap_or("extractor failed without output")
        .trim()
        .to_string();

    ExtractorError::new(kind, message)
}

#[derive(Deserialize)]
struct RawMetadata {
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    filesize: Option<u64>,
    filesize_approx: Option<u64>,
}

/// Parse the JSON document printed by `yt-dlp --dump-json`
///
/// Missing fields are filled in rather than rejected; only malformed JSON is an error.
pub fn parse_metadata_json(stdout: &str) -> Result<MediaMetadata, ExtractorError> {
    // Playlists print one document per line; the first is the requested item
    let document = stdout
        .lines()
        .find(|line| line.trim_start().starts_with('{'))
        .ok_or_else(|| {
            ExtractorError::new(ExtractorErrorKind::Unknown, "no metadata in extractor output")
        })?;

    let raw: RawMetadata = serde_json::from_str(document).map_err(|e| {
        ExtractorError::new(
            ExtractorErrorKind::Unknown,
            format!("invalid metadata JSON: {e}"),
        )
    })?;

    Ok(MediaMetadata {
        title: raw.title.unwrap_or_else(|| "untitled".to_string()),
        duration_secs: raw.duration.map(|d| d.max(0.0).round() as u64).unwrap_or(0),
        uploader: raw
            .uploader
            .or(raw.channel)
            .unwrap_or_else(|| "unknown".to_string()),
        size_estimate: raw.filesize.or(raw.filesize_approx),
    })
}
