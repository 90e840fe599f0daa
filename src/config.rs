//! Crawl settings.
//!
//! Settings come from an optional YAML file; every field has a default so an
//! empty file (or no file at all) crawls the standard itch.io sources. CLI
//! flags in [`crate::cli::Cli`] override individual values afterwards.
//!
//! ```yaml
//! max_age_days: 14
//! jams:
//!   max_pages: 3
//! sources:
//!   - url: https://itch.io/blog
//!     label: "[BLOG]"
//!   - url: https://itch.io/jams/upcoming
//!     label: "[JAMS]"
//!     kind: jam_listing
//! ```

use crate::cli::Cli;
use crate::models::{Source, SourceKind};
use serde::Deserialize;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument};

const DEFAULT_ORIGIN: &str = "https://itch.io";

/// A configured source as written in the settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    pub url: String,
    pub label: String,
    /// Overrides URL-shape classification when present.
    #[serde(default)]
    pub kind: Option<SourceKind>,
}

/// Safety caps for paginated jam listings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JamLimits {
    /// Listing pages fetched per source.
    pub max_pages: u32,
    /// Cards kept from a single listing page.
    pub per_page_cap: usize,
    /// Jam links kept across every jam source in one run.
    pub total_cap: usize,
}

impl Default for JamLimits {
    fn default() -> Self {
        Self {
            max_pages: 5,
            per_page_cap: 60,
            total_cap: 400,
        }
    }
}

/// Channel-level feed metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelInfo {
    pub title: String,
    pub link: String,
    pub description: String,
}

impl Default for ChannelInfo {
    fn default() -> Self {
        Self {
            title: "itch.io Charity Bundles — Opportunities".to_string(),
            link: DEFAULT_ORIGIN.to_string(),
            description: "Auto-collected posts and jams related to charity/fundraisers on itch.io (fresh-only)."
                .to_string(),
        }
    }
}

/// Everything the crawl needs to know.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub site_origin: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Politeness delay after fetches, in milliseconds.
    pub delay_ms: u64,
    /// Freshness window for blog and board items.
    pub max_age_days: i64,
    pub max_feed_items: usize,
    pub feed_path: PathBuf,
    pub state_path: PathBuf,
    pub jams: JamLimits,
    pub channel: ChannelInfo,
    pub sources: Vec<SourceEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site_origin: DEFAULT_ORIGIN.to_string(),
            user_agent: "itchio-charity-watcher/1.9".to_string(),
            timeout_secs: 30,
            delay_ms: 1000,
            max_age_days: 30,
            max_feed_items: 50,
            feed_path: PathBuf::from("feed.xml"),
            state_path: PathBuf::from(".seen.json"),
            jams: JamLimits::default(),
            channel: ChannelInfo::default(),
            sources: default_sources(),
        }
    }
}

fn default_sources() -> Vec<SourceEntry> {
    let entry = |url: &str, label: &str| SourceEntry {
        url: url.to_string(),
        label: label.to_string(),
        kind: None,
    };
    vec![
        entry("https://itch.io/blog", "[BLOG]"),
        entry("https://itch.io/board/533649/game-jams", "[BOARD]"),
        entry("https://itch.io/jams/starting-this-month", "[JAMS]"),
        entry("https://itch.io/jams/starting-this-month/sort-date", "[JAMS]"),
        entry("https://itch.io/jams/starting-this-week", "[JAMS]"),
        entry("https://itch.io/jams/starting-this-week/sort-date", "[JAMS]"),
        entry("https://itch.io/jams/in-progress", "[JAMS]"),
        entry("https://itch.io/jams/in-progress/sort-date", "[JAMS]"),
    ]
}

impl Settings {
    /// Parse settings from YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Load settings from the CLI's config path (if any), then apply CLI
    /// overrides.
    #[instrument(level = "info", skip_all)]
    pub async fn load(cli: &Cli) -> Result<Self, Box<dyn Error>> {
        let mut settings = match &cli.config {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path).await?;
                info!(%path, "Loaded settings file");
                Self::from_yaml(&raw)?
            }
            None => Self::default(),
        };
        settings.apply_overrides(cli);
        Ok(settings)
    }

    fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(path) = &cli.feed_path {
            self.feed_path = PathBuf::from(path);
        }
        if let Some(path) = &cli.state_path {
            self.state_path = PathBuf::from(path);
        }
        if let Some(n) = cli.max_items {
            self.max_feed_items = n;
        }
        if let Some(ms) = cli.delay_ms {
            self.delay_ms = ms;
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured sources, each classified once.
    pub fn sources(&self) -> Vec<Source> {
        self.sources
            .iter()
            .map(|entry| Source {
                url: entry.url.clone(),
                label: entry.label.clone(),
                kind: entry
                    .kind
                    .unwrap_or_else(|| SourceKind::classify(&entry.url, &self.site_origin)),
            })
            .collect()
    }
}
