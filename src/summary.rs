//! What a load run did: release, feed and file counters plus the final shape
//! of every table in the database.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::store::{GtfsStore, LoadReport, PatchOutcome};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    // releases and feeds
    pub releases_loaded: usize,
    pub releases_skipped: usize,
    pub feeds_loaded: usize,
    pub feeds_skipped: usize,

    // table files
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub rows_loaded: usize,

    pub tables: BTreeMap<String, TableSummary>,
    pub timepoint: Option<PatchOutcome>,
}

/// One flattened line of run history, suitable for CSV.
#[derive(Debug, Serialize)]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub releases_loaded: usize,
    pub releases_skipped: usize,
    pub feeds_loaded: usize,
    pub feeds_skipped: usize,
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub rows_loaded: usize,
    pub tables: usize,
    pub timepoint: Option<PatchOutcome>,
}

impl RunSummary {
    pub fn start() -> Self {
        RunSummary {
            started_at: Utc::now(),
            ..Default::default()
        }
    }

    pub fn record_load(&mut self, report: &LoadReport) {
        self.files_loaded += 1;
        self.rows_loaded += report.rows;
    }

    /// Stamps the finish time and snapshots the final shape of every table.
    pub fn finish(&mut self, store: &GtfsStore, timepoint: PatchOutcome) -> Result<(), StoreError> {
        self.tables.clear();
        for table in store.table_names()? {
            let columns = store.column_names(&table)?.map_or(0, |c| c.len());
            let rows = store.row_count(&table)?;
            self.tables.insert(table, TableSummary { rows, columns });
        }

        self.timepoint = Some(timepoint);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn to_record(&self) -> RunRecord {
        RunRecord {
            started_at: self.started_at,
            finished_at: self.finished_at,
            releases_loaded: self.releases_loaded,
            releases_skipped: self.releases_skipped,
            feeds_loaded: self.feeds_loaded,
            feeds_skipped: self.feeds_skipped,
            files_loaded: self.files_loaded,
            files_skipped: self.files_skipped,
            rows_loaded: self.rows_loaded,
            tables: self.tables.len(),
            timepoint: self.timepoint,
        }
    }
}
