//! Time and URL helpers used by every scraper.
//!
//! - Defensive ISO-8601 parsing (never errors, returns `None` instead)
//! - Freshness gating for dated items
//! - Relative-to-absolute link resolution against the site origin
//! - Rewriting the `page` query parameter of listing URLs

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;
use url::Url;

/// Query parameter that selects a listing page.
pub const PAGE_PARAM: &str = "page";

/// Parse an ISO-8601-ish timestamp into UTC.
///
/// Accepts RFC 3339 (`Z` or numeric offsets), naive date-times (assumed UTC,
/// `T` or space separated, optional fractional seconds) and bare dates
/// (midnight UTC). Anything else yields `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    debug!(raw, "Unparseable timestamp");
    None
}

/// Whether `timestamp` lies within `max_age_days` of `now`.
///
/// Missing timestamps are never fresh.
pub fn is_fresh(timestamp: Option<DateTime<Utc>>, max_age_days: i64, now: DateTime<Utc>) -> bool {
    match timestamp {
        Some(ts) => now - ts <= Duration::days(max_age_days),
        None => false,
    }
}

/// Resolve `href` to an absolute URL on `site_origin`.
///
/// Absolute http(s) links pass through, root-relative paths are appended to
/// the origin and anything else is resolved against the origin's root.
/// Empty input, or input that cannot be resolved, yields an empty string.
pub fn to_absolute(href: &str, site_origin: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let origin = site_origin.trim_end_matches('/');
    if href.starts_with('/') {
        return format!("{origin}{href}");
    }
    Url::parse(&format!("{origin}/"))
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_default()
}

/// Return `url` with its `page` query parameter set to `page`.
///
/// Other parameters keep their order; the path and fragment are untouched.
/// A URL that does not parse is returned unchanged.
pub fn with_page_number(url: &str, page: u32) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        debug!(url, "Cannot set page on unparseable URL");
        return url.to_string();
    };

    let mut replaced = false;
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (k, v) in parsed.query_pairs() {
        if k == PAGE_PARAM {
            if !replaced {
                pairs.push((k.into_owned(), page.to_string()));
                replaced = true;
            }
        } else {
            pairs.push((k.into_owned(), v.into_owned()));
        }
    }
    if !replaced {
        pairs.push((PAGE_PARAM.to_string(), page.to_string()));
    }

    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}
