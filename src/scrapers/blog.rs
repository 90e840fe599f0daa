//! Blog index.
//!
//! Charity anchors on the index are followed to the post itself to find a
//! publish date; only posts inside the freshness window are kept. A post whose
//! page cannot be fetched has no date and is dropped.

use super::{ALL_ANCHORS, AnchorHit, Crawl, charity_anchors, page_timestamp};
use crate::fetch::Fetch;
use crate::models::CandidateItem;
use crate::utils::is_fresh;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

static BLOG_ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href*='/blog/']").unwrap());

/// Charity anchors on the index, restricted to post-shaped links when the
/// page has any.
pub fn blog_anchors(html: &str, origin: &str) -> Vec<AnchorHit> {
    let document = Html::parse_document(html);
    if document.select(&BLOG_ANCHORS).next().is_some() {
        charity_anchors(&document, &BLOG_ANCHORS, origin)
    } else {
        charity_anchors(&document, &ALL_ANCHORS, origin)
    }
}

fn post_timestamp(html: &str) -> Option<DateTime<Utc>> {
    page_timestamp(&Html::parse_document(html))
}

/// Scan the blog index and keep fresh charity posts.
#[instrument(level = "info", skip_all, fields(%label))]
pub async fn scan_blog_index<F: Fetch>(crawl: &Crawl<'_, F>, html: &str, label: &str) -> Vec<CandidateItem> {
    let origin = crawl.origin();
    let post_prefix = format!("{origin}/blog/");
    let hits = blog_anchors(html, origin);
    info!(count = hits.len(), "Charity anchors on blog index");

    let mut dates: HashMap<String, Option<DateTime<Utc>>> = HashMap::new();
    let mut items = Vec::new();
    for hit in hits {
        let timestamp = if !hit.href.starts_with(&post_prefix) {
            None
        } else if let Some(known) = dates.get(&hit.href) {
            *known
        } else {
            let ts = match crawl.fetcher.fetch(&hit.href).await {
                Ok(body) => post_timestamp(&body),
                Err(e) => {
                    warn!(url = %hit.href, error = %e, "Blog post fetch failed; dropping");
                    None
                }
            };
            dates.insert(hit.href.clone(), ts);
            ts
        };

        if is_fresh(timestamp, crawl.settings.max_age_days, crawl.now) {
            items.push(CandidateItem::new(label, &hit.text, &hit.href, &hit.snippet, timestamp));
        } else {
            debug!(url = %hit.href, ?timestamp, "Blog post is undated or stale");
        }
    }
    items
}
