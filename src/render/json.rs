//! JSON Feed 1.1 output (<https://www.jsonfeed.org/version/1.1/>).

use anyhow::{Context, Result};
use serde::Serialize;

use super::rss::file_name;
use crate::config::Settings;
use crate::ranking::AggregationResult;
use crate::types::Entry;
use crate::util::{clean_html, strip_xml_invalid_chars, truncate_text};

const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1.1";
const SUMMARY_LENGTH: usize = 200;

#[derive(Debug, Serialize)]
struct JsonFeed<'a> {
    version: &'static str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    home_page_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    feed_url: Option<String>,
    description: &'a str,
    items: Vec<JsonItem<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonItem<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    title: &'a str,
    content_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_published: Option<String>,
    tags: Vec<&'a str>,
    /// Extension object: where the item was aggregated from
    #[serde(rename = "_source")]
    source: JsonSource<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSource<'a> {
    title: &'a str,
    feed_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    favicon: Option<&'a str>,
}

impl<'a> JsonItem<'a> {
    fn from_entry(entry: &'a Entry) -> Self {
        let content_text = entry
            .summary
            .as_deref()
            .map(|s| strip_xml_invalid_chars(&clean_html(s)).into_owned())
            .unwrap_or_default();
        let summary = (!content_text.is_empty())
            .then(|| truncate_text(&content_text, SUMMARY_LENGTH).into_owned());

        Self {
            id: &entry.id,
            url: entry.link.as_deref(),
            title: &entry.title,
            summary,
            content_text,
            date_published: entry.published.map(|dt| dt.to_rfc3339()),
            tags: vec![crate::types::category_or_default(&entry.feed_category)],
            source: JsonSource {
                title: &entry.feed_title,
                feed_url: &entry.feed_url,
                favicon: entry.feed_favicon_url.as_deref(),
            },
        }
    }
}

/// Renders the `max_entries.json` newest entries as a JSON Feed.
pub fn render_json_feed(result: &AggregationResult, settings: &Settings) -> Result<String> {
    let site_link = Some(settings.site_link.trim_end_matches('/')).filter(|l| !l.is_empty());
    let feed = JsonFeed {
        version: JSON_FEED_VERSION,
        title: &settings.site_title,
        home_page_url: site_link,
        feed_url: site_link.map(|l| format!("{l}/{}", file_name(&settings.output_files.json))),
        description: &settings.site_description,
        items: result
            .entries
            .iter()
            .take(settings.max_entries.json)
            .map(JsonItem::from_entry)
            .collect(),
    };

    serde_json::to_string_pretty(&feed).context("Failed to serialize JSON feed")
}
