//! Source scrapers.
//!
//! Every configured source is classified once into a [`SourceKind`] and
//! crawled with the matching strategy:
//!
//! | Kind | Module | Strategy |
//! |------|--------|----------|
//! | Blog index | [`blog`] | Charity anchors, post page fetched for a date, freshness gated |
//! | Board listing | [`board`] | Thread links discovered, each thread scanned as a generic page |
//! | Jam listing | [`jams`] | Paginated card scan, then every kept jam page verified |
//! | Generic page | [`generic`] | Charity anchors gated on the page's own date |
//!
//! Parsing is kept in synchronous functions of the page text so a parsed
//! document never lives across an `.await`. Fetch failures are logged and the
//! URL is skipped at whatever level it happened; nothing here aborts a run.

pub mod blog;
pub mod board;
pub mod generic;
pub mod jams;

use crate::config::Settings;
use crate::fetch::Fetch;
use crate::models::{CandidateItem, Source, SourceKind, truncate_chars};
use crate::relevance;
use crate::utils::{parse_timestamp, to_absolute};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};

pub use jams::JamRegistry;

/// Characters of parent-element text used as an anchor's context.
pub const SNIPPET_CHARS: usize = 500;

static ALL_ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static TIME_WITH_DATETIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time[datetime]").unwrap());
static DATE_META: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "meta[property='article:published_time']",
        "meta[name='date']",
        "meta[name='pubdate']",
        "meta[itemprop='datePublished']",
        "meta[itemprop='dateModified']",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});

/// Shared, read-only inputs of one crawl.
pub struct Crawl<'a, F> {
    pub fetcher: &'a F,
    pub settings: &'a Settings,
    /// The run's notion of "now", fixed at start.
    pub now: DateTime<Utc>,
}

impl<'a, F: Fetch> Crawl<'a, F> {
    pub fn new(fetcher: &'a F, settings: &'a Settings, now: DateTime<Utc>) -> Self {
        Self {
            fetcher,
            settings,
            now,
        }
    }

    /// Politeness delay between fetches.
    pub async fn pause(&self) {
        let delay = self.settings.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn origin(&self) -> &str {
        self.settings.site_origin.trim_end_matches('/')
    }
}

/// Extract candidate items from an already fetched source page.
#[instrument(level = "info", skip_all, fields(url = %source.url, kind = ?source.kind))]
pub async fn scan_source<F: Fetch>(
    crawl: &Crawl<'_, F>,
    source: &Source,
    body: String,
    registry: &mut JamRegistry,
) -> Vec<CandidateItem> {
    let items = match source.kind {
        SourceKind::JamListing => {
            jams::scan_jam_listing(crawl, &source.url, &source.label, Some(body), registry).await
        }
        SourceKind::BlogIndex => blog::scan_blog_index(crawl, &body, &source.label).await,
        SourceKind::BoardListing => board::scan_board(crawl, &body, &source.label).await,
        SourceKind::GenericPage => generic::scan_page(
            &body,
            &source.label,
            crawl.origin(),
            crawl.settings.max_age_days,
            crawl.now,
        ),
    };
    info!(count = items.len(), "Scanned source");
    items
}

/// Visible text of an element with whitespace collapsed.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Best publish/modify time of a page: the first parseable
/// `<time datetime>`, then the usual date meta tags.
pub fn page_timestamp(document: &Html) -> Option<DateTime<Utc>> {
    let from_time = document
        .select(&TIME_WITH_DATETIME)
        .filter_map(|t| t.value().attr("datetime"))
        .find_map(parse_timestamp);
    if from_time.is_some() {
        return from_time;
    }
    DATE_META.iter().find_map(|selector| {
        document
            .select(selector)
            .next()
            .and_then(|m| m.value().attr("content"))
            .and_then(parse_timestamp)
    })
}

/// An on-site anchor whose text and surroundings mention charity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorHit {
    pub href: String,
    pub text: String,
    /// Parent element text, at most [`SNIPPET_CHARS`] characters.
    pub snippet: String,
}

/// Anchors matched by `selector` that point at `origin`, carry text, and
/// whose "text — parent text" blob passes the charity matcher.
pub fn charity_anchors(document: &Html, selector: &Selector, origin: &str) -> Vec<AnchorHit> {
    let mut hits = Vec::new();
    for anchor in document.select(selector) {
        let href = to_absolute(anchor.value().attr("href").unwrap_or_default(), origin);
        let text = element_text(anchor);
        if href.is_empty() || text.is_empty() || !href.starts_with(origin) {
            continue;
        }
        let snippet = anchor
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| truncate_chars(&element_text(parent), SNIPPET_CHARS))
            .unwrap_or_default();
        let blob = format!("{text} — {snippet}");
        if let Some(term) = relevance::matched_term(&blob) {
            debug!(%href, term, "Charity anchor");
            hits.push(AnchorHit {
                href,
                text,
                snippet,
            });
        }
    }
    hits
}
