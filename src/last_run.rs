//! Run throttling: remembers when the last successful run finished.
//!
//! Stored as `{"last_run": "<RFC 3339>"}`.

use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::writer::write_atomic;

#[derive(Debug, Error)]
pub enum LastRunError {
    #[error("Failed to access last-run file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid last-run file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct LastRunRecord {
    last_run: DateTime<Utc>,
}

/// Reads the recorded instant; `Ok(None)` when no run has been recorded.
pub fn read(path: &Path) -> Result<Option<DateTime<Utc>>, LastRunError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let record: LastRunRecord = serde_json::from_str(&content)?;
    Ok(Some(record.last_run))
}

/// Records `at` as the last successful run.
pub fn write(path: &Path, at: DateTime<Utc>) -> Result<(), LastRunError> {
    let json = serde_json::to_string_pretty(&LastRunRecord { last_run: at })?;
    write_atomic(path, json.as_bytes())?;
    Ok(())
}

/// True when fewer than `interval_hours` have passed since `last_run`.
///
/// A recorded instant later than `now` never throttles, so a skewed clock
/// or a hand-edited file can't block runs indefinitely.
pub fn is_throttled(
    last_run: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    interval_hours: u64,
) -> bool {
    let interval = i64::try_from(interval_hours)
        .ok()
        .and_then(TimeDelta::try_hours)
        .unwrap_or(TimeDelta::MAX);
    last_run.is_some_and(|last| {
        let elapsed = now - last;
        elapsed >= TimeDelta::zero() && elapsed < interval
    })
}
