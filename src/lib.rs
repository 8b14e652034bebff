//! feedhub: aggregates the feeds of an OPML subscription list into a merged
//! RSS feed, a feed directory, a JSON Feed and a static HTML dashboard.
//!
//! Pipeline: [`feed::opml`] → [`feed::Aggregator`] → [`ranking::AggregationResult`]
//! → [`render::write_outputs`].

pub mod config;
pub mod feed;
pub mod last_run;
pub mod ranking;
pub mod render;
pub mod types;
pub mod util;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use config::Settings;
use feed::{Aggregator, Fetcher};
use ranking::AggregationResult;
use types::FeedDescriptor;

/// Aggregates `descriptors`, ranks the result and writes every artifact
/// under `out_dir`.
///
/// Fails without touching `out_dir` when there are no descriptors or no
/// feed produced any entry.
pub async fn generate(
    settings: &Settings,
    descriptors: &[FeedDescriptor],
    out_dir: &Path,
) -> Result<(AggregationResult, Vec<PathBuf>)> {
    let fetcher = Fetcher::from_settings(&settings.fetch).context("Failed to build HTTP client")?;
    let aggregator = Aggregator::new(fetcher, settings.fetch.concurrency);

    let aggregation = aggregator.aggregate(descriptors).await?;
    let result = AggregationResult::build(aggregation, Utc::now());
    let written = render::write_outputs(&result, settings, out_dir)?;

    Ok((result, written))
}
