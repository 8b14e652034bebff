use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use feedhub::config::Settings;
use feedhub::feed::opml;
use feedhub::last_run;

#[derive(Parser, Debug)]
#[command(
    name = "feedhub",
    version,
    about = "Aggregate OPML subscriptions into RSS, JSON Feed and HTML"
)]
struct Args {
    /// Settings file (TOML); defaults apply when missing
    #[arg(long, value_name = "PATH", default_value = "feedhub.toml")]
    config: PathBuf,

    /// OPML subscription list
    #[arg(long, value_name = "PATH", default_value = "feeds.opml")]
    opml: PathBuf,

    /// Directory the generated files are written to
    #[arg(long, value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Run even if the last run is more recent than the update interval
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedhub=info")),
        )
        .init();

    let args = Args::parse();

    let settings = Settings::load(&args.config)
        .with_context(|| format!("Failed to load settings from '{}'", args.config.display()))?;

    let last_run_path = args.out_dir.join(&settings.last_run_file);
    if !args.force {
        match last_run::read(&last_run_path) {
            Ok(last) if last_run::is_throttled(last, Utc::now(), settings.update_interval_hours) => {
                tracing::info!(
                    last_run = ?last,
                    interval_hours = settings.update_interval_hours,
                    "Last run is too recent, skipping (use --force to override)"
                );
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    path = %last_run_path.display(),
                    error = %e,
                    "Ignoring unreadable last-run file"
                );
            }
        }
    }

    let descriptors = opml::load(&args.opml).with_context(|| {
        format!("Failed to read subscriptions from '{}'", args.opml.display())
    })?;
    tracing::info!(feeds = descriptors.len(), "Loaded subscriptions");

    let (result, written) = feedhub::generate(&settings, &descriptors, &args.out_dir).await?;

    last_run::write(&last_run_path, Utc::now()).context("Failed to record last run")?;

    tracing::info!(
        feeds = result.feeds.len(),
        entries = result.entries.len(),
        files = written.len(),
        "Run complete"
    );
    Ok(())
}
