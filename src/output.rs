//! Reporting a finished load run.
//!
//! The counters and table shapes of a run go to the log, and a one-line
//! record per run can be kept in a CSV history file.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Result;
use csv::WriterBuilder;
use tracing::{debug, info};

use crate::summary::RunSummary;

/// Dumps every counter and table snapshot at debug level.
pub fn print_pretty(summary: &RunSummary) {
    debug!("{:#?}", summary);
}

/// Logs the run summary as JSON, e.g. for collection by a log shipper.
pub fn print_json(summary: &RunSummary) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

/// Adds this run's [`RunRecord`](crate::summary::RunRecord) to the history
/// file at `path`. A new file gets a header row first.
pub fn append_record(path: &Path, summary: &RunSummary) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending run record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(summary.to_record())?;
    writer.flush()?;

    Ok(())
}
