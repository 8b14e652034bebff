//! Static HTML dashboard.
//!
//! Layout: header with totals, category navigation, one section per
//! category listing its feeds (newest first) with their latest entries,
//! then the merged list of latest posts.

use std::fmt::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::escape::escape;

use crate::config::Settings;
use crate::ranking::AggregationResult;
use crate::types::{Entry, FeedSummary};
use crate::util::{
    clean_html, format_date, format_relative_time, sanitize_filename, truncate_text, validate_url,
};

const DESCRIPTION_LENGTH: usize = 200;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; color: #222; background: #fafafa; }
header, main, footer { max-width: 1100px; margin: 0 auto; padding: 1rem; }
.layout-sidebar { display: grid; grid-template-columns: 220px 1fr; gap: 1rem; }
nav.menu ul { list-style: none; padding: 0; margin: 0; }
nav.menu.horizontal ul { display: flex; flex-wrap: wrap; gap: .5rem 1rem; }
.feed { background: #fff; border: 1px solid #e3e3e3; border-radius: 6px; padding: .75rem; margin: .75rem 0; }
.feed.recent { border-color: #4caf50; }
.feed img.favicon { width: 16px; height: 16px; vertical-align: middle; margin-right: .4rem; }
.badge { background: #4caf50; color: #fff; border-radius: 3px; padding: 0 .35rem; font-size: .75rem; }
.meta, time { color: #777; font-size: .85rem; }
"#;

/// Renders the dashboard page.
pub fn render_dashboard(result: &AggregationResult, settings: &Settings) -> Result<String> {
    let mut html = String::with_capacity(64 * 1024);
    write_page(&mut html, result, settings).context("Failed to render HTML dashboard")?;
    Ok(html)
}

fn write_page(
    out: &mut String,
    result: &AggregationResult,
    settings: &Settings,
) -> std::fmt::Result {
    let title = escape(settings.site_title.as_str());
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"en\">")?;
    writeln!(out, "<head>")?;
    writeln!(out, "<meta charset=\"utf-8\">")?;
    writeln!(
        out,
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">"
    )?;
    writeln!(
        out,
        "<meta name=\"generator\" content=\"{}\">",
        escape(settings.generator.as_str())
    )?;
    writeln!(out, "<title>{title}</title>")?;
    writeln!(
        out,
        "<link rel=\"alternate\" type=\"application/rss+xml\" title=\"{title}\" href=\"{}\">",
        escape(settings.output_files.rss.as_str())
    )?;
    writeln!(out, "<style>{STYLE}</style>")?;
    writeln!(out, "</head>")?;
    writeln!(out, "<body>")?;

    write_header(out, result, settings)?;

    let layout = if settings.ui.horizontal_menu {
        "layout-horizontal"
    } else {
        "layout-sidebar"
    };
    writeln!(out, "<main class=\"{layout}\">")?;
    write_menu(out, result, settings.ui.horizontal_menu)?;

    writeln!(out, "<div class=\"content\">")?;
    for group in &result.categories {
        writeln!(
            out,
            "<section class=\"category\" id=\"{}\">",
            escape(sanitize_filename(&group.name).as_str())
        )?;
        writeln!(
            out,
            "<h2>{} <span class=\"meta\">({})</span></h2>",
            escape(group.name.as_str()),
            group.feeds.len()
        )?;
        for feed in &group.feeds {
            write_feed(out, feed, result.feed_entries(&feed.url), result.generated_at)?;
        }
        writeln!(out, "</section>")?;
    }

    write_latest(out, result, settings.max_entries.html)?;
    writeln!(out, "</div>")?;
    writeln!(out, "</main>")?;

    writeln!(out, "<footer class=\"meta\">")?;
    writeln!(out, "Generated by {}", escape(settings.generator.as_str()))?;
    writeln!(out, "</footer>")?;
    writeln!(out, "</body>")?;
    writeln!(out, "</html>")
}

fn write_header(
    out: &mut String,
    result: &AggregationResult,
    settings: &Settings,
) -> std::fmt::Result {
    writeln!(out, "<header>")?;
    writeln!(out, "<h1>{}</h1>", escape(settings.site_title.as_str()))?;
    if !settings.site_description.is_empty() {
        writeln!(out, "<p>{}</p>", escape(settings.site_description.as_str()))?;
    }
    writeln!(
        out,
        "<p class=\"meta\">{} feeds &middot; {} posts &middot; {} updated in the last 24 hours</p>",
        result.feeds.len(),
        result.entries.len(),
        result.recent_feed_count()
    )?;
    writeln!(
        out,
        "<p class=\"meta\">Last updated: {} &middot; updates every {} hours</p>",
        escape(format_date(Some(result.generated_at.to_rfc3339().as_str())).as_str()),
        settings.update_interval_hours
    )?;

    write!(
        out,
        "<p class=\"meta\"><a href=\"{}\">RSS</a> &middot; \
         <a href=\"{}\">Feed directory</a> &middot; <a href=\"{}\">JSON Feed</a>",
        escape(settings.output_files.rss.as_str()),
        escape(settings.output_files.feeds.as_str()),
        escape(settings.output_files.json.as_str())
    )?;
    if let Some(opml_url) = settings.opml_export_url() {
        write!(out, " &middot; <a href=\"{}\">Export OPML</a>", escape(opml_url.as_str()))?;
    }
    writeln!(out, "</p>")?;
    writeln!(out, "</header>")
}

fn write_menu(out: &mut String, result: &AggregationResult, horizontal: bool) -> std::fmt::Result {
    let class = if horizontal { "menu horizontal" } else { "menu sidebar" };
    writeln!(out, "<nav class=\"{class}\">")?;
    writeln!(out, "<ul>")?;
    for group in &result.categories {
        writeln!(
            out,
            "<li><a href=\"#{}\">{}</a> <span class=\"meta\">{}</span></li>",
            escape(sanitize_filename(&group.name).as_str()),
            escape(group.name.as_str()),
            group.feeds.len()
        )?;
    }
    writeln!(out, "<li><a href=\"#latest\">Latest posts</a></li>")?;
    writeln!(out, "</ul>")?;
    writeln!(out, "</nav>")
}

fn write_feed(
    out: &mut String,
    feed: &FeedSummary,
    entries: &[Entry],
    now: DateTime<Utc>,
) -> std::fmt::Result {
    let class = if feed.has_recent_update { "feed recent" } else { "feed" };
    writeln!(out, "<article class=\"{class}\">")?;

    write!(out, "<h3>")?;
    if let Some(favicon) = feed.favicon_url.as_deref().and_then(web_url) {
        write!(
            out,
            "<img class=\"favicon\" src=\"{}\" alt=\"\" loading=\"lazy\">",
            escape(favicon)
        )?;
    }
    let href = feed.link.as_deref().and_then(web_url).or_else(|| web_url(&feed.url));
    write_link(out, href, &feed.title)?;
    if feed.has_recent_update {
        write!(out, " <span class=\"badge\">New</span>")?;
    }
    writeln!(out, "</h3>")?;

    let latest = feed
        .latest_post
        .map(|t| format_relative_time(t, now))
        .unwrap_or_else(|| "no dated posts".to_string());
    write!(
        out,
        "<p class=\"meta\">{} posts &middot; latest {} &middot; ",
        feed.entry_count,
        escape(latest.as_str())
    )?;
    write_link(out, web_url(&feed.url), "feed")?;
    writeln!(out, "</p>")?;

    if let Some(description) = &feed.description {
        let text = clean_html(description);
        let text = truncate_text(&text, DESCRIPTION_LENGTH);
        writeln!(out, "<p>{}</p>", escape(&*text))?;
    }

    if !entries.is_empty() {
        writeln!(out, "<ul>")?;
        for entry in entries {
            write!(out, "<li>")?;
            write_entry_title(out, entry)?;
            if let Some(published) = entry.published {
                write!(
                    out,
                    " <time datetime=\"{}\">{}</time>",
                    published.to_rfc3339(),
                    escape(format_relative_time(published, now).as_str())
                )?;
            }
            writeln!(out, "</li>")?;
        }
        writeln!(out, "</ul>")?;
    }

    writeln!(out, "</article>")
}

fn write_latest(
    out: &mut String,
    result: &AggregationResult,
    max_entries: usize,
) -> std::fmt::Result {
    writeln!(out, "<section id=\"latest\">")?;
    writeln!(out, "<h2>Latest posts</h2>")?;
    writeln!(out, "<ol>")?;
    for entry in result.entries.iter().take(max_entries) {
        write!(out, "<li>")?;
        write_entry_title(out, entry)?;
        let date = entry.published_rfc2822();
        writeln!(
            out,
            " <span class=\"meta\">{} &middot; {}</span>",
            escape(entry.feed_title.as_str()),
            escape(format_date(date.as_deref()).as_str())
        )?;
        if let Some(summary) = &entry.summary {
            let text = clean_html(summary);
            if !text.is_empty() {
                let text = truncate_text(&text, DESCRIPTION_LENGTH);
                writeln!(out, "<p>{}</p>", escape(&*text))?;
            }
        }
        writeln!(out, "</li>")?;
    }
    writeln!(out, "</ol>")?;
    writeln!(out, "</section>")
}

fn write_entry_title(out: &mut String, entry: &Entry) -> std::fmt::Result {
    write_link(out, entry.link.as_deref().and_then(web_url), &entry.title)
}

/// Writes `text` as an anchor when there is a target, else as plain text.
fn write_link(out: &mut String, href: Option<&str>, text: &str) -> std::fmt::Result {
    match href {
        Some(href) => write!(out, "<a href=\"{}\">{}</a>", escape(href), escape(text)),
        None => write!(out, "{}", escape(text)),
    }
}

/// Passes through absolute `http`/`https` URLs only. Feed-supplied links
/// with any other scheme (`javascript:`, `data:`, ...) are never made live.
fn web_url(url: &str) -> Option<&str> {
    validate_url(url)
        .ok()
        .filter(|parsed| matches!(parsed.scheme(), "http" | "https"))
        .map(|_| url)
}
