use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::types::FeedDescriptor;
use crate::util::validate_url;

/// Maximum nesting depth of `<outline>` elements.
const MAX_OPML_DEPTH: usize = 50;

const UNKNOWN_FEED_TITLE: &str = "Unknown Feed";

#[derive(Debug, Error)]
pub enum OpmlError {
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("Failed to read OPML file: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads a subscription file and parses it with [`try_parse`].
pub fn load(path: &Path) -> Result<Vec<FeedDescriptor>, OpmlError> {
    let content = std::fs::read_to_string(path)?;
    try_parse(&content)
}

/// Lenient variant of [`try_parse`]: a malformed document is logged and
/// yields no descriptors, so callers detect it by emptiness.
pub fn parse(content: &str) -> Vec<FeedDescriptor> {
    match try_parse(content) {
        Ok(feeds) => feeds,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse OPML document");
            Vec::new()
        }
    }
}

/// Extracts one [`FeedDescriptor`] per `<outline>` carrying an `xmlUrl`.
///
/// Outlines are collected at any depth, in document order. Folder outlines
/// (no `xmlUrl`) are traversed but not returned. Outlines whose URL lacks a
/// scheme or host are skipped with a warning.
///
/// quick-xml never expands `<!ENTITY>` declarations: only the five XML
/// builtins are resolved, and custom entity references fail with an
/// unrecognized-entity error.
pub fn try_parse(content: &str) -> Result<Vec<FeedDescriptor>, OpmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feeds = Vec::new();
    let mut buf = Vec::new();
    let mut depth: usize = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                depth += 1;
                if depth > MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                if let Some(feed) = outline_descriptor(&e, &reader)? {
                    feeds.push(feed);
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                if let Some(feed) = outline_descriptor(&e, &reader)? {
                    feeds.push(feed);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    tracing::debug!(count = feeds.len(), "Parsed OPML subscriptions");
    Ok(feeds)
}

/// Returns `None` for folder outlines and for feeds with an invalid URL.
fn outline_descriptor(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Option<FeedDescriptor>, OpmlError> {
    let mut xml_url = None;
    let mut title = None;
    let mut text = None;
    let mut category = None;

    let decoder = reader.decoder();
    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let slot = match attr.key.as_ref() {
            b"xmlUrl" => &mut xml_url,
            b"title" => &mut title,
            b"text" => &mut text,
            b"category" => &mut category,
            _ => continue,
        };
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|e| OpmlError::XmlParse(e.to_string()))?;
        *slot = Some(value.trim().to_string());
    }

    let Some(url) = xml_url else {
        return Ok(None);
    };

    if let Err(e) = validate_url(&url) {
        tracing::warn!(url = %url, error = %e, "Skipping feed with invalid URL");
        return Ok(None);
    }

    let title = title
        .filter(|t| !t.is_empty())
        .or(text.filter(|t| !t.is_empty()))
        .unwrap_or_else(|| UNKNOWN_FEED_TITLE.to_string());

    Ok(Some(FeedDescriptor {
        title,
        url,
        category: category.unwrap_or_default(),
    }))
}
