use chrono::{DateTime, Utc};
use serde::Serialize;

/// Category bucket used for feeds whose OPML outline carries no category
pub const UNCATEGORIZED: &str = "Uncategorized";

// ============================================================================
// Subscriptions
// ============================================================================

/// One subscribed feed, as listed in the OPML document.
///
/// Duplicates are not collapsed: two outlines with the same `xmlUrl`
/// produce two descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedDescriptor {
    /// Trimmed `title`, else `text`, else `"Unknown Feed"`
    pub title: String,
    /// Absolute feed URL (scheme and host validated)
    pub url: String,
    /// Trimmed `category` attribute, empty when absent
    pub category: String,
}

impl FeedDescriptor {
    /// Category name used for grouping, mapping empty to [`UNCATEGORIZED`].
    pub fn category_or_default(&self) -> &str {
        category_or_default(&self.category)
    }
}

pub(crate) fn category_or_default(category: &str) -> &str {
    if category.is_empty() {
        UNCATEGORIZED
    } else {
        category
    }
}

// ============================================================================
// Entries
// ============================================================================

/// A single feed item, stamped with the feed it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    /// Stable identifier: the entry id, else its link, else a content hash
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    /// Raw summary markup as found in the feed
    pub summary: Option<String>,
    /// Publish instant, falling back to the entry's updated instant.
    /// `None` sorts below every dated entry.
    pub published: Option<DateTime<Utc>>,
    pub feed_title: String,
    pub feed_url: String,
    pub feed_category: String,
    pub feed_favicon_url: Option<String>,
}

impl Entry {
    /// Publish date in RFC 2822 form, as used by RSS `pubDate`.
    pub fn published_rfc2822(&self) -> Option<String> {
        self.published.map(|dt| dt.to_rfc2822())
    }
}

// ============================================================================
// Feed summaries
// ============================================================================

/// Per-feed rollup built after the feed's entries have been collected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSummary {
    pub title: String,
    pub url: String,
    pub category: String,
    /// Website link advertised by the feed
    pub link: Option<String>,
    pub description: Option<String>,
    /// Self-reported update instant from the feed header
    pub updated: Option<DateTime<Utc>>,
    /// Newest parsed date among the feed's entries
    pub latest_post: Option<DateTime<Utc>>,
    pub entry_count: usize,
    pub language: String,
    pub favicon_url: Option<String>,
    /// Set by ranking against the evaluation instant, false until then
    pub has_recent_update: bool,
}

impl FeedSummary {
    /// Recency key: newest actual post, else self-reported update.
    pub fn recency(&self) -> Option<DateTime<Utc>> {
        self.latest_post.or(self.updated)
    }

    pub fn category_or_default(&self) -> &str {
        category_or_default(&self.category)
    }
}
