//! Generic page scan, used for board threads and unrecognised pages.
//!
//! The page's own timestamp gates every anchor on it: an undated or stale page
//! contributes nothing.

use super::{ALL_ANCHORS, charity_anchors, page_timestamp};
use crate::models::CandidateItem;
use crate::utils::is_fresh;
use chrono::{DateTime, Utc};
use scraper::Html;
use tracing::debug;

/// One item per on-site charity anchor, provided the page is fresh.
pub fn scan_page(
    html: &str,
    label: &str,
    origin: &str,
    max_age_days: i64,
    now: DateTime<Utc>,
) -> Vec<CandidateItem> {
    let document = Html::parse_document(html);
    let page_ts = page_timestamp(&document);
    if !is_fresh(page_ts, max_age_days, now) {
        debug!(?page_ts, "Page is undated or stale");
        return Vec::new();
    }
    charity_anchors(&document, &ALL_ANCHORS, origin)
        .into_iter()
        .map(|hit| CandidateItem::new(label, &hit.text, &hit.href, &hit.snippet, page_ts))
        .collect()
}
