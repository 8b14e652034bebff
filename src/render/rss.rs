use std::io::Cursor;

use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::config::Settings;
use crate::ranking::AggregationResult;
use crate::util::{clean_html, strip_xml_invalid_chars};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Channel header shared by the generated RSS documents.
pub(super) struct Channel<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub link: &'a str,
    pub generator: &'a str,
    pub last_build_date: String,
    pub language: Option<&'a str>,
    /// File name the document is published under, for `atom:link rel="self"`
    pub self_href: String,
}

pub(super) type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Writes the XML declaration, `<rss>`, `<channel>` and the channel metadata.
pub(super) fn open_channel(channel: &Channel<'_>) -> Result<XmlWriter> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("Failed to write XML declaration")?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:atom", ATOM_NS));
    writer
        .write_event(Event::Start(rss))
        .context("Failed to write rss element")?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .context("Failed to write channel element")?;

    text_element(&mut writer, "title", channel.title)?;
    text_element(&mut writer, "description", channel.description)?;
    text_element(&mut writer, "link", channel.link)?;
    text_element(&mut writer, "lastBuildDate", &channel.last_build_date)?;
    text_element(&mut writer, "generator", channel.generator)?;
    if let Some(language) = channel.language {
        text_element(&mut writer, "language", language)?;
    }

    let mut atom_link = BytesStart::new("atom:link");
    atom_link.push_attribute(("href", channel.self_href.as_str()));
    atom_link.push_attribute(("rel", "self"));
    atom_link.push_attribute(("type", "application/rss+xml"));
    writer
        .write_event(Event::Empty(atom_link))
        .context("Failed to write atom:link element")?;

    Ok(writer)
}

/// Closes `<channel>` and `<rss>` and returns the document text.
pub(super) fn close_channel(mut writer: XmlWriter) -> Result<String> {
    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .context("Failed to write channel end")?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .context("Failed to write rss end")?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).context("Generated RSS contains invalid UTF-8")
}

/// `<name>text</name>`, with XML-illegal characters removed and markup escaped.
pub(super) fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    text_element_with_attrs(writer, name, &[], text)
}

pub(super) fn text_element_with_attrs(
    writer: &mut XmlWriter,
    name: &str,
    attrs: &[(&str, &str)],
    text: &str,
) -> Result<()> {
    let mut start = BytesStart::new(name);
    for (key, value) in attrs {
        let value = strip_xml_invalid_chars(value);
        start.push_attribute((*key, &*value));
    }
    writer
        .write_event(Event::Start(start))
        .with_context(|| format!("Failed to write {name} element"))?;
    writer
        .write_event(Event::Text(BytesText::new(&strip_xml_invalid_chars(text))))
        .with_context(|| format!("Failed to write {name} text"))?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .with_context(|| format!("Failed to write {name} end"))?;
    Ok(())
}

/// Final path component of a configured output path.
pub(super) fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Renders the merged "latest posts" RSS 2.0 feed.
///
/// Contains the `max_entries.rss` newest entries. Each item carries its
/// cleaned summary, the publish date when known, a guid (the link when there
/// is one, otherwise the entry id) and a `<source>` naming the origin feed.
pub fn render_latest(result: &AggregationResult, settings: &Settings) -> Result<String> {
    let channel = Channel {
        title: &settings.site_title,
        description: &settings.site_description,
        link: &settings.site_link,
        generator: &settings.generator,
        last_build_date: result.generated_at.to_rfc2822(),
        language: None,
        self_href: format!("./{}", file_name(&settings.output_files.rss)),
    };
    let mut writer = open_channel(&channel)?;

    for entry in result.entries.iter().take(settings.max_entries.rss) {
        writer
            .write_event(Event::Start(BytesStart::new("item")))
            .context("Failed to write item element")?;

        text_element(&mut writer, "title", &entry.title)?;
        if let Some(link) = &entry.link {
            text_element(&mut writer, "link", link)?;
        }
        let description = entry.summary.as_deref().map(clean_html).unwrap_or_default();
        text_element(&mut writer, "description", &description)?;
        if let Some(pub_date) = entry.published_rfc2822() {
            text_element(&mut writer, "pubDate", &pub_date)?;
        }

        let (guid, is_permalink) = match &entry.link {
            Some(link) => (link.as_str(), "true"),
            None => (entry.id.as_str(), "false"),
        };
        text_element_with_attrs(&mut writer, "guid", &[("isPermaLink", is_permalink)], guid)?;
        text_element_with_attrs(
            &mut writer,
            "source",
            &[("url", entry.feed_url.as_str())],
            &entry.feed_title,
        )?;

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
    fn test_latest_feed_structure() {
        let xml = render_latest(&sample_result(), &Settings::default()).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">"#));
        assert!(xml.contains(
            r#"<atom:link href="./latest.xml" rel="self" type="application/rss+xml"/>"#
        ));
        assert!(xml.contains("<title>Post newer &amp; more</title>"));
        assert!(xml.contains("<description>Hello world</description>"));
        assert!(xml.contains("<pubDate>Fri, 27 Oct 2023 10:00:00 +0000</pubDate>"));
        assert!(xml.contains(r#"<guid isPermaLink="false">newer</guid>"#));
        assert!(xml.contains(r#"<guid isPermaLink="true">https://example.com/older</guid>"#));
        assert!(xml.contains(
            r#"<source url="https://example.com/feed.xml">Example Blog</source>"#
        ));
        assert!(!xml.contains('\u{1}'));
    }

    #[test]
    fn test_latest_feed_is_ranked_and_capped() {
        let mut settings = Settings::default();
        let xml = render_latest(&sample_result(), &settings).unwrap();
        let newer = xml.find("Post newer").unwrap();
        let older = xml.find("Post older").unwrap();
        assert!(newer < older);

        settings.max_entries.rss = 1;
        let xml = render_latest(&sample_result(), &settings).unwrap();
        assert_eq!(xml.matches("<item>").count(), 1);
        assert!(xml.contains("Post newer"));
    }

    #[test]
    fn test_output_parses_as_rss() {
        let xml = render_latest(&sample_result(), &Settings::default()).unwrap();
        let parsed =
            crate::feed::parse_feed(xml.as_bytes(), "https://hub.example/latest.xml").unwrap();
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].title, "Post newer & more");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("out/latest.xml"), "latest.xml");
        assert_eq!(file_name("latest.xml"), "latest.xml");
    }
}
