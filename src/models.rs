//! Data models shared by the scrapers, the state store and the feed writer.
//!
//! - [`CandidateItem`]: one discovered post, thread link or jam
//! - [`SourceKind`]: the extraction strategy a configured source is crawled with
//! - [`Source`]: a configured (URL, label) pair, classified once at load time

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum title length, in characters.
pub const MAX_TITLE_CHARS: usize = 160;
/// Maximum summary length, in characters.
pub const MAX_SUMMARY_CHARS: usize = 280;

/// Board thread URLs, either the legacy `/community/<id>/<id>` form or
/// `/board/<id>/<slug>/<thread>`.
pub static THREAD_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/(community/\d+/\d+|board/\d+/[^/]+/.+)").unwrap());

/// A discovered item, immutable once built by an extraction strategy.
///
/// `title` and `link` together are the business key; see
/// [`crate::state::fingerprint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    /// Label-prefixed title, at most [`MAX_TITLE_CHARS`] characters.
    pub title: String,
    /// Absolute URL on the crawled site.
    pub link: String,
    /// Short description, at most [`MAX_SUMMARY_CHARS`] characters.
    pub summary: String,
    /// Best known publish time. `None` is a valid state, not an error.
    pub timestamp: Option<DateTime<Utc>>,
    /// Tag of the source this item came from, e.g. `[BLOG]`.
    pub label: String,
}

impl CandidateItem {
    /// Build an item, prefixing the title with the source label and
    /// applying the title and summary length caps.
    pub fn new(
        label: &str,
        title: &str,
        link: &str,
        summary: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            title: truncate_chars(&format!("{label} {title}"), MAX_TITLE_CHARS),
            link: link.to_string(),
            summary: truncate_chars(summary, MAX_SUMMARY_CHARS),
            timestamp,
            label: label.to_string(),
        }
    }
}

/// How a source page is crawled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// The site's blog index; matches are followed to the post for a date.
    BlogIndex,
    /// A discussion board listing; thread pages are scanned one level deep.
    BoardListing,
    /// A paginated jam listing; cards are filtered, then jam pages verified.
    JamListing,
    /// Anything else: a date-gated anchor scan of the page itself.
    GenericPage,
}

impl SourceKind {
    /// Classify a URL by its shape relative to `site_origin`.
    pub fn classify(url: &str, site_origin: &str) -> Self {
        let origin = site_origin.trim_end_matches('/');
        let jams_prefix = format!("{origin}/jams");
        if url.starts_with(&jams_prefix) {
            SourceKind::JamListing
        } else if url.trim_end_matches('/') == format!("{origin}/blog") {
            SourceKind::BlogIndex
        } else if url.contains("/board/") && !THREAD_HREF.is_match(url) {
            SourceKind::BoardListing
        } else {
            SourceKind::GenericPage
        }
    }
}

/// A configured crawl source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub label: String,
    pub kind: SourceKind,
}

/// Cut `s` to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
