//! Platform allow-list
//!
//! Links are accepted only when their host is one of the configured domains or a
//! subdomain of one (`m.youtube.com`, `vm.tiktok.com`). Lookalike hosts such as
//! `notyoutube.com` or `youtube.com.evil.net` are rejected.

use crate::config::{PlatformConfig, PlatformEntry};
use url::Url;

/// Matches submitted links against the allow-listed platforms
#[derive(Clone, Debug)]
pub struct PlatformRegistry {
    entries: Vec<PlatformEntry>,
}

impl PlatformRegistry {
    /// Build a registry from configuration, normalising domains to lower case
    pub fn from_config(config: &PlatformConfig) -> Self {
        let entries = config
            .platforms
            .iter()
            .map(|p| PlatformEntry {
                domain: normalize_host(&p.domain.to_ascii_lowercase()).to_string(),
                name: p.name.clone(),
            })
            .filter(|p| !p.domain.is_empty())
            .collect();
        Self { entries }
    }

    /// Platform the link belongs to, if any
    ///
    /// Only absolute `http`/`https` links are considered.
    pub fn match_url(&self, link: &str) -> Option<&PlatformEntry> {
        let url = Url::parse(link.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }

        let host = url.host_str()?.to_ascii_lowercase();
        let host = normalize_host(&host);

        self.entries.iter().find(|entry| {
            host == entry.domain
                || host
                    .strip_suffix(entry.domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Whether the link belongs to an allow-listed platform
    pub fn is_supported(&self, link: &str) -> bool {
        self.match_url(link).is_some()
    }

    /// Display names of all platforms, in configuration order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !names.contains(&entry.name.as_str()) {
                names.push(&entry.name);
            }
        }
        names
    }
}

fn normalize_host(host: &str) -> &str {
    let host = host.trim().trim_end_matches('.');
    host.strip_prefix("www.").unwrap_or(host)
}
