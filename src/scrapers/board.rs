//! Discussion board listings.
//!
//! Two stages: collect the thread links on the listing, then run the generic
//! page scan over each thread. Threads are never followed further.

use super::{ALL_ANCHORS, Crawl, generic};
use crate::fetch::Fetch;
use crate::models::{CandidateItem, THREAD_HREF};
use crate::utils::to_absolute;
use itertools::Itertools;
use scraper::Html;
use tracing::{info, instrument, warn};

/// Absolute thread URLs linked from a board listing, sorted and unique.
pub fn thread_links(html: &str, origin: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ALL_ANCHORS)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| THREAD_HREF.is_match(href))
        .map(|href| to_absolute(href, origin))
        .filter(|link| !link.is_empty())
        .sorted()
        .dedup()
        .collect()
}

/// Scan every thread linked from a board listing.
#[instrument(level = "info", skip_all, fields(%label))]
pub async fn scan_board<F: Fetch>(crawl: &Crawl<'_, F>, html: &str, label: &str) -> Vec<CandidateItem> {
    let threads = thread_links(html, crawl.origin());
    info!(count = threads.len(), "Found board threads");

    let mut items = Vec::new();
    for thread in &threads {
        match crawl.fetcher.fetch(thread).await {
            Ok(body) => items.extend(generic::scan_page(
                &body,
                label,
                crawl.origin(),
                crawl.settings.max_age_days,
                crawl.now,
            )),
            Err(e) => warn!(url = %thread, error = %e, "Thread fetch failed; skipping"),
        }
        crawl.pause().await;
    }
    items
}
