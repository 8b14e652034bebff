use std::borrow::Cow;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use scraper::Html;

/// Ellipsis appended by [`truncate_text`]
const ELLIPSIS: &str = "...";

/// Maximum length (in chars) of a sanitized filename
const MAX_FILENAME_LEN: usize = 255;

static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();
static UNSAFE_FILENAME_RE: OnceLock<Regex> = OnceLock::new();

fn whitespace_re() -> &'static Regex {
    WHITESPACE_RE
        .get_or_init(|| Regex::new(r"\s+").unwrap_or_else(|e| unreachable!("static regex: {e}")))
}

fn unsafe_filename_re() -> &'static Regex {
    UNSAFE_FILENAME_RE.get_or_init(|| {
        Regex::new(r#"[<>:"/\\|?*]"#).unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

/// Elements whose text content is never shown to a reader.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "template", "noscript"];

/// Converts an HTML fragment from a feed into a single line of plain text.
///
/// The fragment is parsed as HTML, so attribute values, comments and the
/// contents of `<script>`/`<style>` never leak into the result, and every
/// named or numeric character reference is decoded. Runs of whitespace are
/// collapsed into single spaces.
///
/// Escaped markup such as `&lt;p&gt;` survives as literal `<p>` text.
///
/// # Examples
///
/// ```
/// use feedhub::util::clean_html;
///
/// assert_eq!(clean_html("<p>Hello</p>"), "Hello");
/// assert_eq!(clean_html("Hello<script>alert('xss')</script>"), "Hello");
/// assert_eq!(clean_html("&lt;p&gt;escaped&lt;/p&gt;"), "<p>escaped</p>");
/// ```
pub fn clean_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let fragment = Html::parse_fragment(text);
    let mut plain = String::with_capacity(text.len());
    for node in fragment.root_element().descendants() {
        let Some(content) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            plain.push_str(content);
        }
    }

    whitespace_re().replace_all(&plain, " ").trim().to_owned()
}

/// Truncates text to at most `max_length` characters, appending "...".
///
/// When a space falls within the last 20% of the cut, the text is cut at that
/// space so words are not split.
///
/// # Examples
///
/// ```
/// use feedhub::util::truncate_text;
///
/// assert_eq!(truncate_text("short text", 20), "short text");
/// assert_eq!(
///     truncate_text("this is a long text that needs to be truncated", 20),
///     "this is a long text..."
/// );
/// ```
pub fn truncate_text(text: &str, max_length: usize) -> Cow<'_, str> {
    let cut = match text.char_indices().nth(max_length) {
        Some((idx, _)) => idx,
        None => return Cow::Borrowed(text),
    };

    let mut truncated = &text[..cut];
    if let Some(last_space) = truncated.rfind(' ') {
        // Position compared in chars, matching max_length's unit
        let space_chars = truncated[..last_space].chars().count();
        if space_chars as f64 > max_length as f64 * 0.8 {
            truncated = &truncated[..last_space];
        }
    }

    Cow::Owned(format!("{truncated}{ELLIPSIS}"))
}

/// Makes a string safe to use as a file name or HTML fragment identifier.
///
/// Replaces `< > : " / \ | ? *` and runs of whitespace with `_`, and caps the
/// result at 255 characters.
pub fn sanitize_filename(filename: &str) -> String {
    let replaced = unsafe_filename_re().replace_all(filename, "_");
    let replaced = whitespace_re().replace_all(&replaced, "_");
    replaced.chars().take(MAX_FILENAME_LEN).collect()
}

fn is_xml_invalid(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
}

/// Removes characters that XML 1.0 forbids in documents.
///
/// Feed content is copied verbatim into generated RSS, and a single stray
/// control character would make the whole output unparsable. Tab, newline
/// and carriage return are kept.
///
/// Returns `Cow::Borrowed` when nothing needs removing (the common case).
pub fn strip_xml_invalid_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_xml_invalid) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|c| !is_xml_invalid(*c)).collect())
}

/// Formats a feed date string for display, e.g. `October 27, 2023 at 10:00 UTC`.
///
/// Accepts RFC 3339, RFC 2822 and `YYYY-MM-DD HH:MM:SS` (assumed UTC). A missing
/// date yields `"Unknown date"`; an unparsable one is returned unchanged.
pub fn format_date(date_str: Option<&str>) -> String {
    let Some(raw) = date_str.map(str::trim).filter(|s| !s.is_empty()) else {
        return "Unknown date".to_owned();
    };

    let parsed = DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc()));

    match parsed {
        Ok(dt) => dt.format("%B %d, %Y at %H:%M UTC").to_string(),
        Err(_) => raw.to_owned(),
    }
}

/// Describes how long ago `then` was, relative to `now` ("3 hours ago").
///
/// Instants older than a week fall back to an absolute date.
pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let secs = delta.num_seconds();

    if secs < 60 {
        return "just now".to_owned();
    }

    let (count, unit) = if delta.num_minutes() < 60 {
        (delta.num_minutes(), "minute")
    } else if delta.num_hours() < 24 {
        (delta.num_hours(), "hour")
    } else if delta.num_days() < 7 {
        (delta.num_days(), "day")
    } else {
        return then.format("%b %d, %Y").to_string();
    };

    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}
