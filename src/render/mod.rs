//! Output artifacts generated from an [`AggregationResult`].
//!
//! - [`rss`] - merged latest-posts RSS 2.0 feed
//! - [`directory`] - RSS 2.0 feed listing every subscription
//! - [`json`] - JSON Feed 1.1 of latest posts
//! - [`html`] - static dashboard
//! - [`writer`] - atomic file replacement

pub mod directory;
pub mod html;
pub mod json;
pub mod rss;
pub mod writer;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::ranking::AggregationResult;

pub use directory::render_directory;
pub use html::render_dashboard;
pub use json::render_json_feed;
pub use rss::render_latest;

/// Renders every artifact and writes them under `out_dir`.
///
/// All documents are rendered before the first file is touched, so a
/// rendering failure leaves previous outputs in place. Returns the written
/// paths in a fixed order: RSS, directory, JSON, HTML.
pub fn write_outputs(
    result: &AggregationResult,
    settings: &Settings,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let files = &settings.output_files;
    let documents = [
        (&files.rss, render_latest(result, settings)?),
        (&files.feeds, render_directory(result, settings)?),
        (&files.json, render_json_feed(result, settings)?),
        (&files.html, render_dashboard(result, settings)?),
    ];

    let mut written = Vec::with_capacity(documents.len());
    for (name, content) in documents {
        let path = out_dir.join(name);
        writer::write_atomic(&path, content.as_bytes())
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        tracing::info!(path = %path.display(), bytes = content.len(), "Generated output");
        written.push(path);
    }

    Ok(written)
}
