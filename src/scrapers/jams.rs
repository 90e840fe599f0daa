//! Jam listings: paginated card scan followed by per-jam verification.
//!
//! # Card filter
//!
//! A card is the few ancestors around an anchor to `/jam/...`. Cards that say
//! "Ended" are dropped outright. Otherwise a card needs one of the status
//! phrases ("Starts in", "Submission closes in", "Ends in", "Closes in"); when
//! the card also carries a `<time datetime>` that time must be in the future.
//!
//! # Pagination
//!
//! Pages `1..=max_pages` are fetched in order. A failed page is skipped, a page
//! after the first that keeps nothing new ends the walk, and the run-wide
//! [`JamRegistry`] caps how many jams are kept across all listings.
//!
//! # Verification
//!
//! Card text is only a cheap pre-filter. Every kept jam page is fetched and the
//! charity matcher runs over its description regions; that decides inclusion.

use super::{Crawl, element_text};
use crate::fetch::Fetch;
use crate::models::CandidateItem;
use crate::relevance;
use crate::utils::{parse_timestamp, to_absolute, with_page_number};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Ancestor steps from a jam anchor to its card container.
pub const CARD_DEPTH: usize = 3;

static JAM_ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href*='/jam/']").unwrap());
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static ENDED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bEnded\b").unwrap());
static STATUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(Starts in|Submission closes in|Ends in|Closes in)\b").unwrap()
});
static DESCRIPTION_REGIONS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        ".jam_summary",
        ".jam_header",
        ".jam_body",
        ".jam_about",
        ".formatted_description",
        ".user_formatted_description",
        "article",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, .jam_title, .header_title").unwrap());

/// Jam URLs already queued for verification during this run.
#[derive(Debug, Default)]
pub struct JamRegistry {
    links: HashSet<String>,
}

impl JamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `link` was not registered before.
    pub fn insert(&mut self, link: &str) -> bool {
        self.links.insert(link.to_string())
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }
}

/// A jam card that passed the card filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JamCard {
    pub link: String,
    /// Structured time found on the card, if any.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Whether a card with `text` (and optional structured time) is worth a
/// detail fetch.
pub fn card_is_open(text: &str, timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    if ENDED.is_match(text) {
        return false;
    }
    let has_status = STATUS.is_match(text);
    match timestamp {
        Some(ts) => has_status && ts > now,
        None => has_status,
    }
}

fn card_container(anchor: ElementRef<'_>) -> ElementRef<'_> {
    let mut node = anchor;
    for _ in 0..CARD_DEPTH {
        match node.parent().and_then(ElementRef::wrap) {
            Some(parent) => node = parent,
            None => break,
        }
    }
    node
}

fn card_time(container: ElementRef<'_>) -> Option<DateTime<Utc>> {
    container
        .select(&TIME)
        .next()
        .and_then(|t| t.value().attr("datetime"))
        .and_then(parse_timestamp)
}

/// Open jam cards on one listing page, in document order.
///
/// The same jam may appear more than once (image and title links).
pub fn extract_open_cards(html: &str, origin: &str, now: DateTime<Utc>) -> Vec<JamCard> {
    let document = Html::parse_document(html);
    let jam_prefix = format!("{origin}/jam/");
    let mut cards = Vec::new();
    for anchor in document.select(&JAM_ANCHOR) {
        let link = to_absolute(anchor.value().attr("href").unwrap_or_default(), origin);
        if !link.starts_with(&jam_prefix) {
            continue;
        }
        let container = card_container(anchor);
        let text = element_text(container);
        let timestamp = card_time(container);
        if card_is_open(&text, timestamp, now) {
            cards.push(JamCard { link, timestamp });
        } else {
            debug!(%link, "Card filtered out");
        }
    }
    cards
}

/// Walk the pages of one jam listing and collect new open cards.
///
/// `first_body` is the already fetched listing page; it is used for page 1
/// when page 1 is the base URL itself.
#[instrument(level = "info", skip_all, fields(%base_url))]
pub async fn collect_jam_links<F: Fetch>(
    crawl: &Crawl<'_, F>,
    base_url: &str,
    mut first_body: Option<String>,
    registry: &mut JamRegistry,
) -> Vec<JamCard> {
    let limits = &crawl.settings.jams;
    let origin = crawl.origin();
    let mut collected = Vec::new();

    for page in 1..=limits.max_pages {
        if registry.len() >= limits.total_cap {
            info!(total_cap = limits.total_cap, "Jam cap reached");
            break;
        }

        let page_url = if page == 1 && !base_url.contains("page=") {
            base_url.to_string()
        } else {
            with_page_number(base_url, page)
        };
        let prefetched = if page_url == base_url {
            first_body.take()
        } else {
            None
        };
        let body = match prefetched {
            Some(body) => body,
            None => match crawl.fetcher.fetch(&page_url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(url = %page_url, error = %e, "Listing page fetch failed; skipping");
                    continue;
                }
            },
        };

        let mut kept_here = 0usize;
        for card in extract_open_cards(&body, origin, crawl.now) {
            if !registry.insert(&card.link) {
                continue;
            }
            collected.push(card);
            kept_here += 1;
            if kept_here >= limits.per_page_cap || registry.len() >= limits.total_cap {
                break;
            }
        }
        debug!(page, kept = kept_here, "Scanned listing page");

        if kept_here == 0 && page > 1 {
            info!(page, "No new jams on page; stopping");
            break;
        }

        crawl.pause().await;
    }

    info!(count = collected.len(), "Collected jam links");
    collected
}

/// What a jam page says about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JamPage {
    pub is_charity: bool,
    pub description: String,
    pub title: Option<String>,
}

/// Read a jam page's description regions (or the whole body when it has none)
/// and title.
pub fn inspect_jam_page(html: &str) -> JamPage {
    let document = Html::parse_document(html);

    let mut chunks: Vec<String> = DESCRIPTION_REGIONS
        .iter()
        .flat_map(|selector| document.select(selector))
        .map(element_text)
        .collect();
    if chunks.is_empty() {
        let whole = document
            .select(&BODY)
            .next()
            .unwrap_or_else(|| document.root_element());
        chunks.push(element_text(whole));
    }
    let description = chunks.join(" ");

    // First title-ish element in document order; an empty one means no title.
    let title = document
        .select(&TITLE)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty());

    JamPage {
        is_charity: relevance::matches(&description),
        description,
        title,
    }
}

/// Turn a verified jam page into a feed item. Jams always get a timestamp:
/// the card's, else `now`.
pub fn jam_item(page: &JamPage, card: &JamCard, label: &str, now: DateTime<Utc>) -> Option<CandidateItem> {
    if !page.is_charity {
        return None;
    }
    let title = page.title.as_deref().unwrap_or("Jam");
    Some(CandidateItem::new(
        label,
        title,
        &card.link,
        &page.description,
        Some(card.timestamp.unwrap_or(now)),
    ))
}

/// Fetch every kept jam page and keep the ones that mention charity.
#[instrument(level = "info", skip_all, fields(count = cards.len()))]
pub async fn verify_jams<F: Fetch>(
    crawl: &Crawl<'_, F>,
    cards: &[JamCard],
    label: &str,
) -> Vec<CandidateItem> {
    let mut items = Vec::new();
    for card in cards {
        match crawl.fetcher.fetch(&card.link).await {
            Ok(body) => {
                let page = inspect_jam_page(&body);
                match jam_item(&page, card, label, crawl.now) {
                    Some(item) => {
                        info!(label = %item.label, link = %item.link, "Charity jam");
                        items.push(item);
                    }
                    None => debug!(link = %card.link, "Jam page has no charity terms"),
                }
            }
            Err(e) => warn!(link = %card.link, error = %e, "Jam page fetch failed; skipping"),
        }
        crawl.pause().await;
    }
    items
}

/// Full jam listing pipeline: walk the pages, then verify each jam.
pub async fn scan_jam_listing<F: Fetch>(
    crawl: &Crawl<'_, F>,
    base_url: &str,
    label: &str,
    first_body: Option<String>,
    registry: &mut JamRegistry,
) -> Vec<CandidateItem> {
    let cards = collect_jam_links(crawl, base_url, first_body, registry).await;
    verify_jams(crawl, &cards, label).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::fetch::testing::StaticFetcher;
    use chrono::{Duration, TimeZone};

    const LISTING: &str = "https://itch.io/jams/in-progress";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn settings() -> Settings {
        Settings {
            delay_ms: 0,
            ..Settings::default()
        }
    }

    fn card(slug: &str, status: &str) -> String {
        format!(
            r#"<div class="jam"><div class="padded"><h3><a href="/jam/{slug}">{slug}</a></h3><div class="status">{status}</div></div></div>"#
        )
    }

    fn listing(cards: &[String]) -> String {
        format!("<html><body><div class=\"jam_grid\">{}</div></body></html>", cards.concat())
    }

    #[test]
    fn test_card_filter_ended_always_loses() {
        let future = Some(now() + Duration::days(3));
        assert!(!card_is_open("Charity Art Jam — Ended 3 days ago", None, now()));
        assert!(!card_is_open("Ended · Starts in 2 days", None, now()));
        assert!(!card_is_open("ENDED Submission closes in 1 day", future, now()));
    }

    #[test]
    fn test_card_filter_status_phrases() {
        assert!(card_is_open("Submission Relief Jam — Starts in 2 days", None, now()));
        assert!(card_is_open("Submission closes in 4 hours", None, now()));
        assert!(card_is_open("ends in 3 days", None, now()));
        assert!(card_is_open("Closes in 1 week", None, now()));
        assert!(!card_is_open("A jam about frogs", None, now()));
        assert!(!card_is_open("Blended jam", None, now()));
    }

    #[test]
    fn test_card_filter_structured_time_must_be_future() {
        assert!(card_is_open("Starts in 2 days", Some(now() + Duration::days(2)), now()));
        assert!(!card_is_open("Starts in 2 days", Some(now() - Duration::days(2)), now()));
        assert!(!card_is_open("A jam", Some(now() + Duration::days(2)), now()));
    }

    #[test]
    fn test_extract_open_cards() {
        let html = listing(&[
            card("relief-jam", "Starts in 2 days"),
            card("old-jam", "Ended 3 days ago"),
            card("quiet-jam", "Hosted by someone"),
            r#"<div><div><div><a href="https://other.site/jam/x">x</a> Starts in 1 day</div></div></div>"#.to_string(),
            r#"<div><div><p><a href="/jam/timed">timed</a></p><time datetime="2025-06-03T00:00:00Z">soon</time> Ends in 2 days</div></div>"#.to_string(),
        ]);
        let cards = extract_open_cards(&html, "https://itch.io", now());
        assert_eq!(
            cards,
            vec![
                JamCard {
                    link: "https://itch.io/jam/relief-jam".into(),
                    timestamp: None
                },
                JamCard {
                    link: "https://itch.io/jam/timed".into(),
                    timestamp: Some(Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap())
                },
            ]
        );
    }

    #[test]
    fn test_inspect_jam_page_regions_and_title() {
        let html = r#"<html><body>
            <div class="jam_header"><h1>Flood Relief Jam</h1></div>
            <div class="jam_body">Make games, all proceeds are donations.</div>
            <footer>charity footer</footer>
        </body></html>"#;
        let page = inspect_jam_page(html);
        assert!(page.is_charity);
        assert_eq!(page.title.as_deref(), Some("Flood Relief Jam"));
        assert_eq!(page.description, "Flood Relief Jam Make games, all proceeds are donations.");
    }

    #[test]
    fn test_inspect_jam_page_title_in_document_order() {
        let html = r#"<html><body><div class="jam_title">Card Title Jam</div><h1>Header H1</h1></body></html>"#;
        assert_eq!(inspect_jam_page(html).title.as_deref(), Some("Card Title Jam"));

        let blank_first = r#"<html><body><h1>  </h1><div class="header_title">Later Title</div></body></html>"#;
        assert_eq!(inspect_jam_page(blank_first).title, None);
    }

    #[test]
    fn test_inspect_jam_page_body_fallback() {
        let page = inspect_jam_page("<html><body><p>A fundraiser jam</p></body></html>");
        assert!(page.is_charity);
        assert_eq!(page.title, None);
        assert_eq!(page.description, "A fundraiser jam");
    }

    #[test]
    fn test_inspect_jam_page_regions_win_over_body() {
        let html = r#"<html><body><div class="jam_summary">A speedrun jam</div><p>charity</p></body></html>"#;
        assert!(!inspect_jam_page(html).is_charity);
    }

    #[test]
    fn test_jam_item_timestamp_and_title() {
        let page = JamPage {
            is_charity: true,
            description: "relief".into(),
            title: None,
        };
        let card = JamCard {
            link: "https://itch.io/jam/x".into(),
            timestamp: None,
        };
        let item = jam_item(&page, &card, "[JAMS]", now()).unwrap();
        assert_eq!(item.title, "[JAMS] Jam");
        assert_eq!(item.timestamp, Some(now()));

        let later = now() + Duration::days(5);
        let dated = JamCard {
            timestamp: Some(later),
            ..card.clone()
        };
        assert_eq!(jam_item(&page, &dated, "[JAMS]", now()).unwrap().timestamp, Some(later));

        let plain = JamPage {
            is_charity: false,
            ..page
        };
        assert!(jam_item(&plain, &card, "[JAMS]", now()).is_none());
    }

    #[tokio::test]
    async fn test_walker_stops_after_empty_page() {
        let page1 = listing(&[card("a", "Starts in 1 day"), card("b", "Starts in 1 day"), card("c", "Ends in 2 days")]);
        let page2 = listing(&[card("old", "Ended yesterday")]);
        let page3 = listing(&[card("d", "Starts in 1 day"), card("e", "Starts in 1 day")]);
        let fetcher = StaticFetcher::new()
            .with_page(LISTING, &page1)
            .with_page(&format!("{LISTING}?page=2"), &page2)
            .with_page(&format!("{LISTING}?page=3"), &page3);
        let settings = settings();
        let crawl = Crawl::new(&fetcher, &settings, now());
        let mut registry = JamRegistry::new();

        let cards = collect_jam_links(&crawl, LISTING, None, &mut registry).await;

        let links: Vec<_> = cards.iter().map(|c| c.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://itch.io/jam/a", "https://itch.io/jam/b", "https://itch.io/jam/c"]
        );
        assert!(!fetcher.was_requested(&format!("{LISTING}?page=3")));
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn test_walker_skips_failed_page_and_uses_prefetched_first_page() {
        let page1 = listing(&[card("a", "Starts in 1 day")]);
        let page3 = listing(&[card("b", "Starts in 1 day")]);
        let fetcher = StaticFetcher::new().with_page(&format!("{LISTING}?page=3"), &page3);
        let settings = Settings {
            jams: crate::config::JamLimits {
                max_pages: 3,
                ..Default::default()
            },
            ..settings()
        };
        let crawl = Crawl::new(&fetcher, &settings, now());
        let mut registry = JamRegistry::new();

        let cards = collect_jam_links(&crawl, LISTING, Some(page1), &mut registry).await;

        assert_eq!(cards.len(), 2);
        assert!(!fetcher.was_requested(LISTING));
        assert!(fetcher.was_requested(&format!("{LISTING}?page=2")));
    }

    #[tokio::test]
    async fn test_walker_respects_registry_and_caps() {
        let page1 = listing(&[
            card("a", "Starts in 1 day"),
            card("b", "Starts in 1 day"),
            card("c", "Starts in 1 day"),
        ]);
        let fetcher = StaticFetcher::new().with_page(LISTING, &page1);
        let settings = Settings {
            jams: crate::config::JamLimits {
                max_pages: 1,
                per_page_cap: 60,
                total_cap: 2,
            },
            ..settings()
        };
        let crawl = Crawl::new(&fetcher, &settings, now());
        let mut registry = JamRegistry::new();
        registry.insert("https://itch.io/jam/a");

        let cards = collect_jam_links(&crawl, LISTING, None, &mut registry).await;

        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].link, "https://itch.io/jam/b");
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_walker_per_page_cap() {
        let page1 = listing(&[
            card("a", "Starts in 1 day"),
            card("b", "Starts in 1 day"),
            card("c", "Starts in 1 day"),
        ]);
        let fetcher = StaticFetcher::new().with_page(LISTING, &page1);
        let settings = Settings {
            jams: crate::config::JamLimits {
                max_pages: 1,
                per_page_cap: 2,
                total_cap: 400,
            },
            ..settings()
        };
        let crawl = Crawl::new(&fetcher, &settings, now());
        let mut registry = JamRegistry::new();

        let cards = collect_jam_links(&crawl, LISTING, None, &mut registry).await;

        let links: Vec<_> = cards.iter().map(|c| c.link.as_str()).collect();
        assert_eq!(links, vec!["https://itch.io/jam/a", "https://itch.io/jam/b"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.insert("https://itch.io/jam/c"));
    }

    #[tokio::test]
    async fn test_verify_jams_skips_failed_detail_page() {
        let page1 = listing(&[card("a", "Starts in 1 day"), card("b", "Starts in 1 day")]);
        let fetcher = StaticFetcher::new().with_page(LISTING, &page1).with_page(
            "https://itch.io/jam/b",
            r#"<html><body><h1>B</h1><div class="jam_body">All proceeds go to charity.</div></body></html>"#,
        );
        let settings = Settings {
            jams: crate::config::JamLimits {
                max_pages: 1,
                ..Default::default()
            },
            ..settings()
        };
        let crawl = Crawl::new(&fetcher, &settings, now());
        let mut registry = JamRegistry::new();

        let items = scan_jam_listing(&crawl, LISTING, "[JAMS]", None, &mut registry).await;

        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["[JAMS] B"]);
        assert_eq!(
            fetcher.requests(),
            vec![
                LISTING.to_string(),
                "https://itch.io/jam/a".to_string(),
                "https://itch.io/jam/b".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_jam_listing_verifies_detail_pages() {
        let page1 = listing(&[
            card("relief", "Submission Relief Jam — Starts in 2 days"),
            card("speed", "Speed Jam — Starts in 2 days"),
            card("charity-art", "Charity Art Jam — Ended 3 days ago"),
        ]);
        let fetcher = StaticFetcher::new()
            .with_page(LISTING, &page1)
            .with_page(
                "https://itch.io/jam/relief",
                r#"<html><body><h1>Relief Jam</h1><div class="jam_body">Proceeds go to relief efforts.</div></body></html>"#,
            )
            .with_page(
                "https://itch.io/jam/speed",
                r#"<html><body><h1>Speed Jam</h1><div class="jam_body">Go fast.</div></body></html>"#,
            )
            .with_page(
                "https://itch.io/jam/charity-art",
                r#"<html><body><h1>Charity Art Jam</h1><div class="jam_body">charity</div></body></html>"#,
            );
        let settings = Settings {
            jams: crate::config::JamLimits {
                max_pages: 1,
                ..Default::default()
            },
            ..settings()
        };
        let crawl = Crawl::new(&fetcher, &settings, now());
        let mut registry = JamRegistry::new();

        let items = scan_jam_listing(&crawl, LISTING, "[JAMS]", None, &mut registry).await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "[JAMS] Relief Jam");
        assert_eq!(items[0].link, "https://itch.io/jam/relief");
        assert_eq!(items[0].timestamp, Some(now()));
        assert!(!fetcher.was_requested("https://itch.io/jam/charity-art"));
    }
}
