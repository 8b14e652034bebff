//! Recency ranking and grouping of aggregated feeds.
//!
//! Everything here is pure: the evaluation instant is passed in, nothing
//! touches the network or the filesystem.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

use crate::feed::Aggregation;
use crate::types::{Entry, FeedSummary};

/// Cap of the per-feed entry view
pub const MAX_ENTRIES_PER_FEED: usize = 10;

/// Hours within which a feed's newest post counts as recent activity
pub const RECENT_WINDOW_HOURS: i64 = 24;

/// Sorts entries newest first. Undated entries go last; ties keep their
/// original order.
pub fn rank_entries(entries: &mut [Entry]) {
    // Option orders None below Some, so a descending sort puts undated last
    entries.sort_by(|a, b| b.published.cmp(&a.published));
}

/// Sorts feeds newest first by latest post, else self-reported update.
/// Feeds with neither go last; ties keep their original order.
pub fn rank_feeds(feeds: &mut [FeedSummary]) {
    feeds.sort_by_key(|f| std::cmp::Reverse(f.recency()));
}

/// True iff the feed's newest post is at most [`RECENT_WINDOW_HOURS`] old
/// at `now`.
pub fn is_recent(summary: &FeedSummary, now: DateTime<Utc>) -> bool {
    summary
        .latest_post
        .is_some_and(|latest| now - latest <= TimeDelta::hours(RECENT_WINDOW_HOURS))
}

/// Feeds sharing one category, ranked by recency.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup {
    /// Category name, `"Uncategorized"` for feeds without one
    pub name: String,
    pub feeds: Vec<FeedSummary>,
}

/// Buckets feeds by category. Groups appear in order of their first feed.
pub fn group_by_category(feeds: &[FeedSummary]) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for feed in feeds {
        let name = feed.category_or_default();
        let slot = *index.entry(name).or_insert_with(|| {
            groups.push(CategoryGroup {
                name: name.to_string(),
                feeds: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].feeds.push(feed.clone());
    }

    for group in &mut groups {
        rank_feeds(&mut group.feeds);
    }
    groups
}

/// The [`MAX_ENTRIES_PER_FEED`] newest entries of each feed, keyed by feed URL.
pub fn entries_by_feed(entries: &[Entry]) -> HashMap<String, Vec<Entry>> {
    let mut by_feed: HashMap<String, Vec<Entry>> = HashMap::new();
    for entry in entries {
        by_feed
            .entry(entry.feed_url.clone())
            .or_default()
            .push(entry.clone());
    }
    for bucket in by_feed.values_mut() {
        rank_entries(bucket);
        bucket.truncate(MAX_ENTRIES_PER_FEED);
    }
    by_feed
}

/// Everything the renderers need, derived once per run.
#[derive(Debug, Clone)]
pub struct AggregationResult {
    /// All entries, ranked
    pub entries: Vec<Entry>,
    /// All feeds, ranked, with `has_recent_update` evaluated
    pub feeds: Vec<FeedSummary>,
    pub categories: Vec<CategoryGroup>,
    pub entries_by_feed: HashMap<String, Vec<Entry>>,
    /// Evaluation instant for recency flags
    pub generated_at: DateTime<Utc>,
}

impl AggregationResult {
    pub fn build(aggregation: Aggregation, now: DateTime<Utc>) -> Self {
        let Aggregation {
            mut entries,
            summaries: mut feeds,
        } = aggregation;

        for feed in &mut feeds {
            feed.has_recent_update = is_recent(feed, now);
        }

        rank_entries(&mut entries);
        rank_feeds(&mut feeds);

        let categories = group_by_category(&feeds);
        let entries_by_feed = entries_by_feed(&entries);

        Self {
            entries,
            feeds,
            categories,
            entries_by_feed,
            generated_at: now,
        }
    }

    /// Newest entries of one feed; empty when the URL is unknown.
    pub fn feed_entries(&self, feed_url: &str) -> &[Entry] {
        self.entries_by_feed
            .get(feed_url)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn recent_feed_count(&self) -> usize {
        self.feeds.iter().filter(|f| f.has_recent_update).count()
    }
}
