//! RSS 2.0 feed generation.
//!
//! # Output Shape
//!
//! ```text
//! <?xml version="1.0" encoding="utf-8"?>
//! <rss version="2.0">
//!   <channel>
//!     <title/> <link/> <description/> <lastBuildDate/>
//!     <item>
//!       <title/> <link/> <guid isPermaLink="false"/> <pubDate/> <description/>
//!     </item>
//!   </channel>
//! </rss>
//! ```
//!
//! The `guid` is the item fingerprint, so a reader sees the same identifier
//! the seen-set uses. Items without a timestamp are dated at build time.

use crate::config::ChannelInfo;
use crate::models::CandidateItem;
use crate::state::item_fingerprint;
use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::error::Error;
use std::io::Write;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// RFC 822 date as used by RSS, always in UTC.
pub fn rss_date(when: DateTime<Utc>) -> String {
    when.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<(), Box<dyn Error>> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Render `items`, in order, as an RSS 2.0 document.
pub fn render_feed(
    items: &[CandidateItem],
    channel: &ChannelInfo,
    now: DateTime<Utc>,
) -> Result<String, Box<dyn Error>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("rss").with_attributes([("version", "2.0")]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;
    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "link", &channel.link)?;
    write_text_element(&mut writer, "description", &channel.description)?;
    write_text_element(&mut writer, "lastBuildDate", &rss_date(now))?;

    for item in items {
        writer.write_event(Event::Start(BytesStart::new("item")))?;
        write_text_element(&mut writer, "title", &item.title)?;
        write_text_element(&mut writer, "link", &item.link)?;

        writer.write_event(Event::Start(
            BytesStart::new("guid").with_attributes([("isPermaLink", "false")]),
        ))?;
        writer.write_event(Event::Text(BytesText::new(&item_fingerprint(item))))?;
        writer.write_event(Event::End(BytesEnd::new("guid")))?;

        write_text_element(&mut writer, "pubDate", &rss_date(item.timestamp.unwrap_or(now)))?;
        let description = if item.summary.is_empty() {
            &item.title
        } else {
            &item.summary
        };
        write_text_element(&mut writer, "description", description)?;
        writer.write_event(Event::End(BytesEnd::new("item")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let mut xml = String::from_utf8(writer.into_inner())?;
    xml.push('\n');
    Ok(xml)
}

/// Render and write the feed to `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = items.len()))]
pub async fn write_feed(
    path: &Path,
    items: &[CandidateItem],
    channel: &ChannelInfo,
    now: DateTime<Utc>,
) -> Result<(), Box<dyn Error>> {
    let xml = render_feed(items, channel, now)?;
    fs::write(path, xml).await?;
    info!("Wrote RSS feed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fingerprint;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 5, 9).unwrap()
    }

    #[test]
    fn test_rss_date_format() {
        assert_eq!(rss_date(now()), "Sun, 01 Jun 2025 08:05:09 +0000");
    }

    #[test]
    fn test_render_empty_feed() {
        let xml = render_feed(&[], &ChannelInfo::default(), now()).unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(xml.contains(r#"<rss version="2.0">"#));
        assert!(xml.contains("<lastBuildDate>Sun, 01 Jun 2025 08:05:09 +0000</lastBuildDate>"));
        assert!(!xml.contains("<item>"));
    }

    #[test]
    fn test_render_items() {
        let dated = CandidateItem::new(
            "[BLOG]",
            "Bundle for Flood & Fire Relief",
            "https://itch.io/blog/1/bundle",
            "Proceeds <all> go to relief",
            Some(Utc.with_ymd_and_hms(2025, 5, 30, 0, 0, 0).unwrap()),
        );
        let undated = CandidateItem::new("[BOARD]", "Charity thread", "https://itch.io/t/2", "", None);

        let xml = render_feed(&[dated.clone(), undated.clone()], &ChannelInfo::default(), now()).unwrap();

        assert_eq!(xml.matches("<item>").count(), 2);
        assert!(xml.contains("<title>[BLOG] Bundle for Flood &amp; Fire Relief</title>"));
        assert!(xml.contains("<description>Proceeds &lt;all&gt; go to relief</description>"));
        assert!(xml.contains(&format!(
            r#"<guid isPermaLink="false">{}</guid>"#,
            fingerprint(&dated.title, &dated.link)
        )));
        assert!(xml.contains("<pubDate>Fri, 30 May 2025 00:00:00 +0000</pubDate>"));
        assert!(xml.contains("<pubDate>Sun, 01 Jun 2025 08:05:09 +0000</pubDate>"));
        assert!(xml.contains("<description>[BOARD] Charity thread</description>"));
        assert!(xml.find("[BLOG]").unwrap() < xml.find("[BOARD]").unwrap());
    }

    #[tokio::test]
    async fn test_write_feed_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.xml");
        write_feed(&path, &[], &ChannelInfo::default(), now()).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("<channel>"));
    }
}
