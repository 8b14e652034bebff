use anyhow::{Context, Result};
use quick_xml::events::{BytesEnd, BytesStart, Event};

use super::rss::{close_channel, file_name, open_channel, text_element, Channel};
use crate::config::Settings;
use crate::ranking::AggregationResult;

/// Renders the feed directory: one RSS item per subscribed feed, ranked by
/// recency.
pub fn render_directory(result: &AggregationResult, settings: &Settings) -> Result<String> {
    let title = format!("{} - Subscribed Feeds", settings.site_title);
    let description = format!(
        "List of {} RSS feeds subscribed to in {}, sorted by latest updates",
        result.feeds.len(),
        settings.site_title
    );
    let channel = Channel {
        title: &title,
        description: &description,
        link: &settings.site_link,
        generator: &settings.generator,
        last_build_date: result.generated_at.to_rfc2822(),
        language: Some("en"),
        self_href: file_name(&settings.output_files.feeds).to_string(),
    };
    let mut writer = open_channel(&channel)?;

    for feed in &result.feeds {
        writer
            .write_event(Event::Start(BytesStart::new("item")))
            .context("Failed to write item element")?;

        text_element(&mut writer, "title", &feed.title)?;
        text_element(&mut writer, "link", feed.link.as_deref().unwrap_or_default())?;
        let summary = format!(
            "RSS Feed: {} | Category: {} | Posts: {} | Language: {}",
            feed.description.as_deref().unwrap_or("No description"),
            feed.category_or_default(),
            feed.entry_count,
            feed.language
        );
        text_element(&mut writer, "description", &summary)?;
        if let Some(updated) = feed.updated {
            text_element(&mut writer, "pubDate", &updated.to_rfc2822())?;
        }
        text_element(&mut writer, "guid", &feed.url)?;
        text_element(&mut writer, "category", feed.category_or_default())?;

        writer
            .write_event(Event::End(BytesEnd::new("item")))
            .context("Failed to write item end")?;
    }

    close_channel(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_support::sample_result;

    #[test]
    fn test_directory_items() {
        let mut result = sample_result();
        result.feeds[0].category = String::new();
        let xml = render_directory(&result, &Settings::default()).unwrap();

        assert!(xml.contains("<title>feedhub - Subscribed Feeds</title>"));
        assert!(xml.contains("List of 1 RSS feeds"));
        assert!(xml.contains("<language>en</language>"));
        assert!(xml.contains(r#"<atom:link href="feeds.xml" rel="self""#));
        assert!(xml.contains(
            "<description>RSS Feed: All about examples | Category: Uncategorized | Posts: 2 | Language: en</description>"
        ));
        assert!(xml.contains("<pubDate>Fri, 27 Oct 2023 11:00:00 +0000</pubDate>"));
        assert!(xml.contains("<guid>https://example.com/feed.xml</guid>"));
        assert!(xml.contains("<category>Uncategorized</category>"));
        assert!(xml.contains("<link>https://example.com/</link>"));
    }

    #[test]
    fn test_directory_defaults_for_missing_fields() {
        let mut result = sample_result();
        result.feeds[0].description = None;
        result.feeds[0].updated = None;
        let xml = render_directory(&result, &Settings::default()).unwrap();

        assert!(xml.contains("RSS Feed: No description | Category: Tech"));
        assert!(!xml.contains("<pubDate>"));
    }
}
