//! Run orchestration.
//!
//! Sources are crawled strictly one after another. Each discovered item is
//! fingerprinted; fingerprints unknown to the previous runs make the item
//! "new". The feed receives the most recently discovered new items, capped,
//! and the full merged seen-set is persisted whatever the feed size.

use crate::config::Settings;
use crate::fetch::Fetch;
use crate::models::{CandidateItem, Source};
use crate::outputs::rss;
use crate::scrapers::{self, Crawl, JamRegistry};
use crate::state::{SeenSet, item_fingerprint};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

/// Outcome of crawling every source once.
#[derive(Debug)]
pub struct RunReport {
    /// New items selected for the feed, in discovery order.
    pub items: Vec<CandidateItem>,
    /// Previous fingerprints plus every fingerprint discovered this run.
    pub seen: SeenSet,
    pub sources_failed: usize,
    /// Candidates discovered, including ones seen before.
    pub candidates: usize,
    /// Candidates not seen before, before the feed cap.
    pub new_items: usize,
}

/// Keep the last `cap` items of `items`.
pub fn latest(mut items: Vec<CandidateItem>, cap: usize) -> Vec<CandidateItem> {
    let excess = items.len().saturating_sub(cap);
    items.drain(..excess);
    items
}

/// Crawl `sources` in order against `previous` state. Never fails: a source
/// that cannot be fetched is logged and skipped.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn run<F: Fetch>(
    fetcher: &F,
    settings: &Settings,
    sources: &[Source],
    previous: &SeenSet,
    now: DateTime<Utc>,
) -> RunReport {
    let crawl = Crawl::new(fetcher, settings, now);
    let mut registry = JamRegistry::new();
    let mut seen = previous.clone();
    let mut found = Vec::new();
    let mut candidates = 0usize;
    let mut sources_failed = 0usize;

    for source in sources {
        match fetcher.fetch(&source.url).await {
            Ok(body) => {
                let items = scrapers::scan_source(&crawl, source, body, &mut registry).await;
                candidates += items.len();
                for item in items {
                    // `insert` is false for fingerprints from earlier runs
                    // and for repeats within this run.
                    if seen.insert(item_fingerprint(&item)) {
                        debug!(label = %item.label, link = %item.link, "New item");
                        found.push(item);
                    }
                }
            }
            Err(e) => {
                sources_failed += 1;
                warn!(url = %source.url, error = %e, "Source fetch failed; skipping");
            }
        }
        crawl.pause().await;
    }

    let new_items = found.len();
    let items = latest(found, settings.max_feed_items);
    info!(
        candidates,
        new_items,
        emitted = items.len(),
        sources_failed,
        seen_total = seen.len(),
        "Crawl finished"
    );

    RunReport {
        items,
        seen,
        sources_failed,
        candidates,
        new_items,
    }
}

/// Load state, crawl, then write the feed and the merged state.
///
/// Write failures are logged; one failing write does not prevent the other.
pub async fn execute<F: Fetch>(fetcher: &F, settings: &Settings, now: DateTime<Utc>) -> RunReport {
    let previous = SeenSet::load(&settings.state_path).await;
    let sources = settings.sources();
    let report = run(fetcher, settings, &sources, &previous, now).await;

    if let Err(e) = rss::write_feed(&settings.feed_path, &report.items, &settings.channel, now).await {
        error!(path = %settings.feed_path.display(), error = %e, "Failed to write feed");
    }
    if let Err(e) = report.seen.save(&settings.state_path).await {
        error!(path = %settings.state_path.display(), error = %e, "Failed to write seen-set");
    }
    info!(
        count = report.items.len(),
        path = %settings.feed_path.display(),
        "Wrote items to feed"
    );
    report
}
