//! Error types for the loader.
//!
//! Each pipeline stage has its own error enum so the run can decide per stage
//! whether a failure is fatal or can be skipped. [`GtfsError`] unifies them.

use std::path::PathBuf;
use thiserror::Error;

/// The downloads directory could not be listed.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read directory {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A release or feed archive could not be extracted.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("failed to open archive {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid zip archive {}: {source}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to write {} from archive: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A delimited table file is malformed.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing header row")]
    MissingHeader,

    #[error("empty column name at position {0}")]
    EmptyColumn(usize),

    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("record {record} has {found} fields, header has {expected}")]
    RaggedRow {
        record: usize,
        expected: usize,
        found: usize,
    },
}

/// A statement against the SQLite store failed.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open database {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("schema change on table {table} failed: {source}")]
    Schema {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Any error a full run can end with.
#[derive(Error, Debug)]
pub enum GtfsError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("{}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, GtfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_carries_path() {
        let err = GtfsError::Parse {
            path: PathBuf::from("feed/stops.txt"),
            source: ParseError::MissingHeader,
        };
        assert_eq!(err.to_string(), "feed/stops.txt: missing header row");
    }

    #[test]
    fn test_discovery_error_is_transparent() {
        let err: GtfsError = DiscoveryError::NotFound(PathBuf::from("downloads")).into();
        assert_eq!(err.to_string(), "directory not found: downloads");
    }
}
