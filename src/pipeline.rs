//! The full load run: reset, discover, extract, load, patch.
//!
//! Releases are processed one at a time in sorted order; every feed and table
//! file of a release is loaded before the next release starts.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::archive;
use crate::config::{Config, ErrorPolicy};
use crate::discover::{Feed, Release, TableFile, discover_feeds, discover_releases, discover_table_files};
use crate::error::{ArchiveError, GtfsError, Result};
use crate::store::GtfsStore;
use crate::summary::RunSummary;
use crate::table::ParsedTable;

/// Deletes `dir` if present and recreates it empty.
pub fn reset_directory(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

/// Performs a complete run against the directories in `config`.
///
/// The extraction and database directories are wiped first, so the resulting
/// database only reflects what is currently in the downloads directory.
#[tracing::instrument(skip_all, fields(downloads = %config.downloads_dir.display()))]
pub fn run(config: &Config) -> Result<RunSummary> {
    let mut summary = RunSummary::start();

    reset_directory(&config.databases_dir)?;
    reset_directory(&config.extracted_dir)?;

    let db_path = config.database_path();
    info!(path = %db_path.display(), "Opening database");
    let mut store = GtfsStore::open(&db_path)?;

    load_releases(&mut store, config, &mut summary)?;

    info!("Fixing missing 'timepoint' field in stop_times");
    let timepoint = store.patch_timepoint()?;
    summary.finish(&store, timepoint)?;

    info!(
        releases = summary.releases_loaded,
        skipped = summary.releases_skipped,
        files = summary.files_loaded,
        rows = summary.rows_loaded,
        "Run complete"
    );
    Ok(summary)
}

/// Loads every release in the downloads directory into `store`.
pub fn load_releases(
    store: &mut GtfsStore,
    config: &Config,
    summary: &mut RunSummary,
) -> Result<()> {
    let releases = discover_releases(&config.downloads_dir)?;
    info!(count = releases.len(), "Processing downloaded releases");

    for release in &releases {
        match process_release(store, release, &config.extracted_dir, config.error_policy, summary) {
            Ok(()) => summary.releases_loaded += 1,
            Err(e) if is_skippable(&e, config.error_policy) => {
                warn!(release = %release.name, error = %e, "Skipping release");
                summary.releases_skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

#[tracing::instrument(skip_all, fields(release = %release.name))]
fn process_release(
    store: &mut GtfsStore,
    release: &Release,
    extracted_dir: &Path,
    policy: ErrorPolicy,
    summary: &mut RunSummary,
) -> Result<()> {
    info!("Unzipping release");
    let release_dir = extracted_dir.join(&release.name);
    archive::extract(&release.path, &release_dir)?;

    for feed in discover_feeds(&release_dir, &release.name)? {
        match process_feed(store, &feed, policy, summary) {
            Ok(()) => summary.feeds_loaded += 1,
            Err(e) if is_skippable(&e, policy) => {
                warn!(feed = %feed.name, error = %e, "Skipping feed");
                summary.feeds_skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

#[tracing::instrument(skip_all, fields(feed = %feed.name))]
fn process_feed(
    store: &mut GtfsStore,
    feed: &Feed,
    policy: ErrorPolicy,
    summary: &mut RunSummary,
) -> Result<()> {
    info!("Unzipping GTFS feed");
    archive::extract(&feed.archive, &feed.dir)?;

    for file in discover_table_files(&feed.dir)? {
        match load_table_file(store, &file, &feed.release, summary) {
            Ok(()) => {}
            Err(e) if is_skippable(&e, policy) => {
                warn!(file = %file.path.display(), error = %e, "Skipping table file");
                summary.files_skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

fn load_table_file(
    store: &mut GtfsStore,
    file: &TableFile,
    release: &str,
    summary: &mut RunSummary,
) -> Result<()> {
    info!(table = %file.entity, "Processing file");

    let table = ParsedTable::from_path(&file.path).map_err(|source| GtfsError::Parse {
        path: file.path.clone(),
        source,
    })?;
    let report = store.load(table, &file.entity, release)?;
    summary.record_load(&report);

    Ok(())
}

/// Unreadable archives and malformed files can be skipped. Failing to write
/// extracted entries is a local filesystem problem and, like discovery and
/// store failures, always ends the run.
fn is_skippable(err: &GtfsError, policy: ErrorPolicy) -> bool {
    policy == ErrorPolicy::Skip
        && matches!(
            err,
            GtfsError::Archive(ArchiveError::Open { .. } | ArchiveError::Invalid { .. })
                | GtfsError::Parse { .. }
        )
}
