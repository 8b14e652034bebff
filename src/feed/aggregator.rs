use futures::stream::{self, StreamExt};
use thiserror::Error;

use super::favicon::FaviconResolver;
use super::fetcher::Fetcher;
use super::parser::{parse_feed, ParsedFeed};
use crate::types::{Entry, FeedDescriptor, FeedSummary};

const DEFAULT_LANGUAGE: &str = "en";

/// Run-level failures. Per-feed problems never surface here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("No feeds found in the subscription list")]
    NoFeeds,

    #[error("No entries collected from {feeds} feeds")]
    NoEntries { feeds: usize },
}

/// Flat output of one aggregation run, in descriptor order.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub entries: Vec<Entry>,
    pub summaries: Vec<FeedSummary>,
}

/// Fetches and normalizes every subscribed feed.
#[derive(Debug, Clone)]
pub struct Aggregator {
    fetcher: Fetcher,
    favicons: FaviconResolver,
    concurrency: usize,
}

impl Aggregator {
    /// `concurrency` bounds the number of feeds in flight; 0 is treated as 1.
    pub fn new(fetcher: Fetcher, concurrency: usize) -> Self {
        Self {
            favicons: FaviconResolver::new(fetcher.clone()),
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetches, parses and stamps every feed.
    ///
    /// Feeds that cannot be fetched, cannot be parsed or contain no entries
    /// are skipped with a warning. Results are collected in descriptor
    /// order regardless of how many feeds are fetched at once.
    ///
    /// # Errors
    ///
    /// [`AggregateError::NoFeeds`] when `descriptors` is empty and
    /// [`AggregateError::NoEntries`] when no feed yielded a single entry.
    pub async fn aggregate(
        &self,
        descriptors: &[FeedDescriptor],
    ) -> Result<Aggregation, AggregateError> {
        if descriptors.is_empty() {
            return Err(AggregateError::NoFeeds);
        }

        let outcomes: Vec<Option<(Vec<Entry>, FeedSummary)>> = stream::iter(descriptors)
            .map(|descriptor| self.process_feed(descriptor))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut aggregation = Aggregation::default();
        for (entries, summary) in outcomes.into_iter().flatten() {
            aggregation.entries.extend(entries);
            aggregation.summaries.push(summary);
        }

        if aggregation.entries.is_empty() {
            return Err(AggregateError::NoEntries {
                feeds: descriptors.len(),
            });
        }

        tracing::info!(
            feeds = aggregation.summaries.len(),
            skipped = descriptors.len() - aggregation.summaries.len(),
            entries = aggregation.entries.len(),
            "Aggregation complete"
        );
        Ok(aggregation)
    }

    async fn process_feed(
        &self,
        descriptor: &FeedDescriptor,
    ) -> Option<(Vec<Entry>, FeedSummary)> {
        tracing::info!(feed = %descriptor.url, title = %descriptor.title, "Processing feed");

        let bytes = match self.fetcher.fetch(&descriptor.url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(feed = %descriptor.url, error = %e, "Skipping feed: fetch failed");
                return None;
            }
        };

        let parsed = match parse_feed(&bytes, &descriptor.url) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(feed = %descriptor.url, error = %e, "Skipping feed: unreadable markup");
                return None;
            }
        };

        if parsed.entries.is_empty() {
            tracing::warn!(feed = %descriptor.url, "Skipping feed: no entries");
            return None;
        }

        let favicon = self
            .favicons
            .resolve(&descriptor.url, parsed.meta.link.as_deref())
            .await;

        Some(stamp_feed(descriptor, parsed, favicon))
    }
}

/// Attaches provenance to every entry of a parsed feed and builds its summary.
pub fn stamp_feed(
    descriptor: &FeedDescriptor,
    parsed: ParsedFeed,
    favicon_url: Option<String>,
) -> (Vec<Entry>, FeedSummary) {
    let entries: Vec<Entry> = parsed
        .entries
        .into_iter()
        .map(|e| Entry {
            id: e.id,
            title: e.title,
            link: e.link,
            summary: e.summary,
            published: e.published,
            feed_title: descriptor.title.clone(),
            feed_url: descriptor.url.clone(),
            feed_category: descriptor.category.clone(),
            feed_favicon_url: favicon_url.clone(),
        })
        .collect();

    let latest_post = entries.iter().filter_map(|e| e.published).max();

    let summary = FeedSummary {
        title: descriptor.title.clone(),
        url: descriptor.url.clone(),
        category: descriptor.category.clone(),
        link: parsed.meta.link,
        description: parsed.meta.description,
        updated: parsed.meta.updated,
        latest_post,
        entry_count: entries.len(),
        language: parsed
            .meta
            .language
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        favicon_url,
        has_recent_update: false,
    };

    (entries, summary)
}
