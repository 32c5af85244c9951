// src/ingest/parser.rs
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::types::{FeedItem, IngestError};
use crate::ingest::{normalize_body, normalize_text};

/// Item children we read, keyed by their full qualified name.
/// Extension elements (`atom:link`, `media:title`, ...) never match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
    DcDate,
    Content,
}

impl Field {
    fn from_qname(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"link" => Some(Self::Link),
            b"description" => Some(Self::Description),
            b"pubDate" => Some(Self::PubDate),
            b"dc:date" => Some(Self::DcDate),
            b"content:encoded" => Some(Self::Content),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct RawItem {
    title: String,
    link: String,
    description: String,
    pub_date: String,
    dc_date: String,
    content: String,
}

impl RawItem {
    /// First non-empty occurrence wins.
    fn set(&mut self, field: Field, text: String) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Description => &mut self.description,
            Field::PubDate => &mut self.pub_date,
            Field::DcDate => &mut self.dc_date,
            Field::Content => &mut self.content,
        };
        if slot.trim().is_empty() {
            *slot = text;
        }
    }
}

/// Text being collected for one item field, opened at `depth`.
struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

fn in_channel(path: &[Vec<u8>]) -> bool {
    matches!(path, [rss, channel] if rss.as_slice() == b"rss" && channel.as_slice() == b"channel")
}

fn parse_error(e: impl std::fmt::Display) -> IngestError {
    counter!("ingest_parse_errors_total").increment(1);
    IngestError::Parse(e.to_string())
}

/// Walk `rss > channel > item*` and collect the raw item fields in document order.
fn read_items(xml: &str) -> Result<Vec<RawItem>, IngestError> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut saw_channel = false;
    let mut items = Vec::new();
    let mut item: Option<RawItem> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event().map_err(parse_error)? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if let Some(c) = capture.as_mut() {
                    // markup nested inside a field still separates words
                    c.text.push(' ');
                } else if in_channel(&path) && name == b"item" {
                    item = Some(RawItem::default());
                } else if path.len() == 1 && path[0] == b"rss" && name == b"channel" {
                    saw_channel = true;
                } else if item.is_some() && path.len() == 3 {
                    if let Some(field) = Field::from_qname(&name) {
                        capture = Some(Capture {
                            field,
                            depth: path.len() + 1,
                            text: String::new(),
                        });
                    }
                }
                path.push(name);
            }
            Event::End(_) => {
                let depth = path.len();
                if capture.as_ref().is_some_and(|c| c.depth == depth) {
                    if let (Some(c), Some(it)) = (capture.take(), item.as_mut()) {
                        it.set(c.field, c.text);
                    }
                } else if let Some(c) = capture.as_mut() {
                    c.text.push(' ');
                } else if depth == 3 && in_channel(&path[..2]) && path[2] == b"item" {
                    if let Some(it) = item.take() {
                        items.push(it);
                    }
                }
                path.pop();
            }
            Event::Text(t) => {
                if let Some(c) = capture.as_mut() {
                    // a stray `&` in one field shouldn't sink the feed
                    match t.unescape() {
                        Ok(text) => c.text.push_str(&text),
                        Err(_) => c.text.push_str(&String::from_utf8_lossy(&t)),
                    }
                }
            }
            Event::CData(t) => {
                if let Some(c) = capture.as_mut() {
                    c.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_channel {
        return Err(parse_error("document has no rss channel"));
    }
    Ok(items)
}

/// Parse an RSS 2.0 document into normalized items, in document order.
///
/// A channel without items is a valid empty feed; anything that is not
/// `rss > channel` is a parse error. Unknown and namespaced extension
/// elements are ignored wherever they appear.
pub fn parse_feed(raw: &str) -> Result<Vec<FeedItem>, IngestError> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(raw);
    let raw_items = read_items(&xml_clean)?;

    let mut out = Vec::with_capacity(raw_items.len());
    for it in raw_items {
        let title = normalize_text(&it.title);
        let link = it.link.trim().to_string();
        if title.is_empty() || link.is_empty() {
            tracing::debug!(target: "ingest", %title, %link, "skipping item without title or link");
            continue;
        }

        let summary = normalize_text(&it.description);
        let body = match normalize_body(&it.content) {
            b if !b.is_empty() => b,
            _ => summary.clone(),
        };
        let published_at = [it.pub_date.as_str(), it.dc_date.as_str()]
            .into_iter()
            .filter(|d| !d.trim().is_empty())
            .find_map(parse_feed_date);

        out.push(FeedItem {
            title,
            link,
            summary,
            published_at,
            body,
        });
    }

    histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("ingest_items_parsed_total").increment(out.len() as u64);
    Ok(out)
}

/// RSS dates are RFC 2822; Dublin Core dates are RFC 3339.
fn parse_feed_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if let Ok(dt) = OffsetDateTime::parse(ts, &Rfc2822) {
        return DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond());
    }
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// XML only knows five named entities; HTML ones like `&nbsp;` break the decoder.
fn scrub_html_entities_for_xml(s: &str) -> String {
    static RE_ENTITY: OnceCell<Regex> = OnceCell::new();
    let re = RE_ENTITY.get_or_init(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").unwrap());
    re.replace_all(s, |caps: &regex::Captures| {
        let whole = &caps[0];
        match &caps[1] {
            "amp" | "lt" | "gt" | "quot" | "apos" => whole.to_string(),
            _ => {
                let decoded = html_escape::decode_html_entities(whole);
                if decoded == whole || decoded.contains(['<', '>', '&']) {
                    " ".to_string()
                } else {
                    decoded.into_owned()
                }
            }
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Wire</title>
    <link>https://wire.example/</link>
    <item>
      <title><![CDATA[Nurses&nbsp;strike over <b>staffing</b>]]></title>
      <link>https://wire.example/a</link>
      <description>Short &amp; sweet&nbsp;summary</description>
      <pubDate>Tue, 07 Oct 2025 09:30:00 GMT</pubDate>
      <content:encoded><![CDATA[<p>First paragraph.</p><p>Second &mdash; paragraph.</p>]]></content:encoded>
    </item>
    <item>
      <title>No date, no body</title>
      <link>https://wire.example/b</link>
    </item>
    <item>
      <title></title>
      <link>https://wire.example/c</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_in_order_and_unwraps_cdata() {
        let items = parse_feed(FEED).unwrap();
        assert_eq!(items.len(), 2);

        let a = &items[0];
        assert_eq!(a.title, "Nurses strike over staffing");
        assert_eq!(a.link, "https://wire.example/a");
        assert_eq!(a.summary, "Short & sweet summary");
        assert_eq!(
            a.published_at,
            Some(Utc.with_ymd_and_hms(2025, 10, 7, 9, 30, 0).unwrap())
        );
        assert!(a.body.starts_with("First paragraph."));
        assert!(a.body.contains("Second"));
        assert!(!a.body.contains("<p>"));

        let b = &items[1];
        assert_eq!(b.published_at, None);
        assert_eq!(b.summary, "");
        assert_eq!(b.body, b.summary);
    }

    #[test]
    fn extension_elements_do_not_collide_with_core_fields() {
        let xml = r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom"
            xmlns:media="http://search.yahoo.com/mrss/" xmlns:dc="http://purl.org/dc/elements/1.1/">
          <channel>
            <atom:link href="https://wire.example/rss" rel="self"/>
            <item>
              <title>Union wins contract</title>
              <media:title type="plain">Photo: picket line</media:title>
              <link>https://w/1</link>
              <atom:link href="https://w/1/amp" rel="amphtml"/>
              <description>Members ratified.</description>
              <media:description>Caption text</media:description>
              <dc:title>Ignored</dc:title>
            </item>
          </channel>
        </rss>"#;
        let items = parse_feed(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Union wins contract");
        assert_eq!(items[0].link, "https://w/1");
        assert_eq!(items[0].summary, "Members ratified.");
    }

    #[test]
    fn channel_elements_between_items_are_skipped() {
        let xml = r#"<rss version="2.0"><channel>
            <item><title>First</title><link>https://w/1</link></item>
            <lastBuildDate>Tue, 07 Oct 2025 09:30:00 GMT</lastBuildDate>
            <item><title>Second</title><link>https://w/2</link></item>
            <image><title>Logo</title><link>https://w/</link></image>
            <item><title>Third</title><link>https://w/3</link></item>
        </channel></rss>"#;
        let titles: Vec<String> = parse_feed(xml).unwrap().into_iter().map(|i| i.title).collect();
        assert_eq!(titles, ["First", "Second", "Third"]);
    }

    #[test]
    fn repeated_field_keeps_first_non_empty_value() {
        let xml = r#"<rss><channel><item>
            <title></title><title>Real title</title><title>Later</title>
            <link>https://w/1</link>
        </item></channel></rss>"#;
        assert_eq!(parse_feed(xml).unwrap()[0].title, "Real title");
    }

    #[test]
    fn empty_channel_is_not_an_error() {
        let xml = r#"<rss version="2.0"><channel><title>x</title></channel></rss>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn non_feed_document_is_parse_error() {
        let err = parse_feed("<html><body>Service unavailable</body></html>").unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
        assert!(matches!(parse_feed("not xml at all"), Err(IngestError::Parse(_))));
    }

    #[test]
    fn dates_accept_rfc3339_fallback() {
        let dt = parse_feed_date("2025-10-07T09:30:00Z").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 10, 7, 9, 30, 0).unwrap());
        assert!(parse_feed_date("yesterday-ish").is_none());
    }

    #[test]
    fn scrub_keeps_xml_entities() {
        assert_eq!(scrub_html_entities_for_xml("a&nbsp;b &amp; c"), "a\u{a0}b &amp; c");
        assert_eq!(scrub_html_entities_for_xml("x&bogus;y"), "x y");
    }
}
