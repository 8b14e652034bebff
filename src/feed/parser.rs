use chrono::{DateTime, Utc};
use feed_rs::model::Link;
use feed_rs::parser;
use quick_xml::events::Event;
use quick_xml::Reader;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Closing tags of the per-entry elements, RSS first then Atom.
const ENTRY_END_TAGS: [&[u8]; 2] = [b"</item>", b"</entry>"];

/// The payload could not be read as RSS or Atom at all.
#[derive(Debug, Error)]
#[error("Malformed feed: {0}")]
pub struct ParseError(String);

/// Channel-level metadata of a parsed feed.
#[derive(Debug, Clone, Default)]
pub struct FeedMeta {
    pub link: Option<String>,
    pub description: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    pub language: Option<String>,
}

/// One item of a parsed feed, before provenance is attached.
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub meta: FeedMeta,
    pub entries: Vec<ParsedEntry>,
}

/// Parses an RSS or Atom payload (format auto-detected).
///
/// Missing per-entry fields never fail the parse: an entry without a title
/// becomes "No Title", one without a publish date falls back to its updated
/// date and otherwise stays undated.
///
/// Damaged markup is tolerated where possible: when the payload doesn't
/// parse, everything after the last complete entry is discarded and the
/// remainder is parsed again. The entries recovered that way are returned
/// with a warning; only a payload with nothing recoverable is an error.
pub fn parse_feed(bytes: &[u8], feed_url: &str) -> Result<ParsedFeed, ParseError> {
    let feed = match parser::parse(bytes) {
        Ok(feed) => feed,
        Err(e) => {
            let recovered = truncate_after_last_entry(bytes)
                .and_then(|repaired| parser::parse(repaired.as_slice()).ok());
            match recovered {
                Some(feed) => {
                    tracing::warn!(
                        feed = %feed_url,
                        error = %e,
                        recovered = feed.entries.len(),
                        "Malformed feed markup, using the entries before the damage"
                    );
                    feed
                }
                None => return Err(ParseError(e.to_string())),
            }
        }
    };

    let meta = FeedMeta {
        link: site_link(&feed.links, feed_url),
        description: feed
            .description
            .map(|d| d.content.trim().to_owned())
            .filter(|d| !d.is_empty()),
        updated: feed.updated.or(feed.published),
        language: feed
            .language
            .map(|l| l.trim().to_owned())
            .filter(|l| !l.is_empty()),
    };

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .iter()
                .find(|l| is_alternate(l))
                .or_else(|| entry.links.first())
                .map(|l| l.href.clone());
            let published = entry.published.or(entry.updated);
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));
            let title = entry
                .title
                .map(|t| t.content.trim().to_owned())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "No Title".to_string());

            let existing_id = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id.as_str())
            };
            let id = generate_id(existing_id, link.as_deref(), &title, published);

            ParsedEntry {
                id,
                title,
                link,
                summary,
                published,
            }
        })
        .collect();

    Ok(ParsedFeed { meta, entries })
}

/// Cuts `bytes` after the last complete `</item>` or `</entry>` and closes
/// every element still open at that point.
///
/// Returns `None` when there is no complete entry or when the kept prefix
/// is itself not well-formed.
fn truncate_after_last_entry(bytes: &[u8]) -> Option<Vec<u8>> {
    let cut = ENTRY_END_TAGS
        .iter()
        .filter_map(|tag| {
            bytes
                .windows(tag.len())
                .rposition(|window| window.eq_ignore_ascii_case(tag))
                .map(|pos| pos + tag.len())
        })
        .max()?;
    let prefix = &bytes[..cut];

    let mut reader = Reader::from_reader(prefix);
    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(start)) => open.push(start.name().as_ref().to_vec()),
            Ok(Event::End(_)) => {
                open.pop()?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
        buf.clear();
    }

    let mut repaired = prefix.to_vec();
    for name in open.iter().rev() {
        repaired.extend_from_slice(b"</");
        repaired.extend_from_slice(name);
        repaired.push(b'>');
    }
    Some(repaired)
}

fn is_alternate(link: &Link) -> bool {
    matches!(link.rel.as_deref(), None | Some("alternate"))
}

/// Picks the website link of a feed: an alternate link that isn't the feed
/// itself, else any non-self link.
fn site_link(links: &[Link], feed_url: &str) -> Option<String> {
    links
        .iter()
        .find(|l| is_alternate(l) && l.href != feed_url)
        .or_else(|| {
            links
                .iter()
                .find(|l| l.rel.as_deref() != Some("self") && l.href != feed_url)
        })
        .map(|l| l.href.clone())
}

/// Entry id, else link, else a digest of link, title and date.
fn generate_id(
    existing: Option<&str>,
    link: Option<&str>,
    title: &str,
    published: Option<DateTime<Utc>>,
) -> String {
    if let Some(id) = existing.map(str::trim).filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    if let Some(link) = link {
        return link.to_string();
    }

    let input = format!(
        "{}|{}|{}",
        link.unwrap_or(""),
        title,
        published.map(|p| p.timestamp().to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
