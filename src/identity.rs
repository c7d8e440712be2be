//! Client identity rotation
//!
//! Each fetch attempt presents a browser-like identity to the host. Rotating the
//! identity between attempts makes anti-automation challenges less likely to repeat.

use rand::seq::SliceRandom;

/// A client identity presented to the media host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityProfile {
    /// User-Agent header value
    pub user_agent: String,
    /// Accept-Language header value
    pub accept_language: String,
    /// Accept header value
    pub accept: String,
}

impl IdentityProfile {
    /// Profile with explicit header values
    pub fn new(
        user_agent: impl Into<String>,
        accept_language: impl Into<String>,
        accept: impl Into<String>,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            accept_language: accept_language.into(),
            accept: accept.into(),
        }
    }

    /// Profile with the Accept headers of a US-English Chromium browser
    pub fn browser(user_agent: impl Into<String>) -> Self {
        Self::new(user_agent, "en-US,en;q=0.9", CHROMIUM_ACCEPT)
    }

    /// Extra request headers besides the User-Agent, as `(name, value)` pairs
    pub fn headers(&self) -> [(&'static str, &str); 2] {
        [
            ("Accept-Language", self.accept_language.as_str()),
            ("Accept", self.accept.as_str()),
        ]
    }
}

const CHROMIUM_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
const FIREFOX_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const SAFARI_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Built-in pool: (User-Agent, Accept-Language, Accept), each header set matching
/// what that browser sends
const DEFAULT_PROFILES: &[(&str, &str, &str)] = &[
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "en-US,en;q=0.9",
        CHROMIUM_ACCEPT,
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "en-GB,en-US;q=0.9,en;q=0.8",
        CHROMIUM_ACCEPT,
    ),
    (
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7",
        CHROMIUM_ACCEPT,
    ),
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
        "en-US,en;q=0.5",
        FIREFOX_ACCEPT,
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
        "en-CA,en;q=0.9",
        SAFARI_ACCEPT,
    ),
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.2478.51",
        "fr-FR,fr;q=0.9,en-US;q=0.8,en;q=0.7",
        CHROMIUM_ACCEPT,
    ),
];

fn default_pool() -> Vec<IdentityProfile> {
    DEFAULT_PROFILES
        .iter()
        .map(|(ua, lang, accept)| IdentityProfile::new(*ua, *lang, *accept))
        .collect()
}

/// Picks identities from a fixed pool
#[derive(Clone, Debug)]
pub struct IdentityRotator {
    pool: Vec<IdentityProfile>,
}

impl Default for IdentityRotator {
    fn default() -> Self {
        Self {
            pool: default_pool(),
        }
    }
}

impl IdentityRotator {
    /// Rotator over a custom pool; an empty pool falls back to the built-in one
    pub fn new(pool: Vec<IdentityProfile>) -> Self {
        if pool.is_empty() {
            tracing::warn!("empty identity pool supplied, using built-in profiles");
            return Self::default();
        }
        Self { pool }
    }

    /// Number of profiles in the pool
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Whether the pool is empty (never true for a constructed rotator)
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// A profile chosen uniformly at random from the pool
    pub fn next_profile(&self) -> IdentityProfile {
        self.pool
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| IdentityProfile::browser(DEFAULT_PROFILES[0].0))
    }

    /// A profile whose User-Agent is not among `used`
    ///
    /// Within one fetch sequence this yields a distinct identity per attempt while
    /// the pool lasts. Once every profile has been used it only avoids repeating the
    /// most recent one, and a single-entry pool repeats.
    pub fn next_profile_avoiding(&self, used: &[String]) -> IdentityProfile {
        let mut rng = rand::thread_rng();

        let fresh: Vec<&IdentityProfile> = self
            .pool
            .iter()
            .filter(|p| !used.contains(&p.user_agent))
            .collect();
        if let Some(profile) = fresh.choose(&mut rng) {
            return (*profile).clone();
        }

        if let Some(previous) = used.last() {
            let others: Vec<&IdentityProfile> = self
                .pool
                .iter()
                .filter(|p| &p.user_agent != previous)
                .collect();
            if let Some(profile) = others.choose(&mut rng) {
                return (*profile).clone();
            }
        }

        self.next_profile()
    }
}
