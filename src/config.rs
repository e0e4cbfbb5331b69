//! Run configuration: where releases come from and where output goes.
//!
//! Values are read from the environment (a `.env` file is loaded by the
//! binary before this runs) and may be overridden on the command line.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;

pub const DEFAULT_DOWNLOADS_DIR: &str = "downloads";
pub const DEFAULT_EXTRACTED_DIR: &str = "extracted";
pub const DEFAULT_DATABASES_DIR: &str = "databases";
pub const DEFAULT_DATABASE_FILE: &str = "GTFS.db";

/// What a run does when a single release, feed or file cannot be processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ErrorPolicy {
    /// Any failure ends the run.
    Abort,
    /// Broken archives and malformed files are logged and skipped.
    #[default]
    Skip,
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(ErrorPolicy::Abort),
            "skip" => Ok(ErrorPolicy::Skip),
            other => Err(format!("unknown error policy '{other}' (expected abort or skip)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the release archives.
    pub downloads_dir: PathBuf,
    /// Scratch directory for extracted releases. Reset on every run.
    pub extracted_dir: PathBuf,
    /// Directory holding the output database. Reset on every run.
    pub databases_dir: PathBuf,
    /// File name of the database inside `databases_dir`.
    pub database_file: String,
    pub error_policy: ErrorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from(DEFAULT_DOWNLOADS_DIR),
            extracted_dir: PathBuf::from(DEFAULT_EXTRACTED_DIR),
            databases_dir: PathBuf::from(DEFAULT_DATABASES_DIR),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl Config {
    /// Builds a config from `GTFS_*` environment variables, falling back to
    /// defaults for anything unset. An unparseable `GTFS_ERROR_POLICY` is an
    /// error rather than a silent fallback.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let error_policy = match lookup("GTFS_ERROR_POLICY") {
            Some(raw) => raw.parse::<ErrorPolicy>().map_err(anyhow::Error::msg)?,
            None => defaults.error_policy,
        };

        Ok(Self {
            downloads_dir: lookup("GTFS_DOWNLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.downloads_dir),
            extracted_dir: lookup("GTFS_EXTRACTED_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.extracted_dir),
            databases_dir: lookup("GTFS_DATABASES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.databases_dir),
            database_file: lookup("GTFS_DATABASE_FILE").unwrap_or(defaults.database_file),
            error_policy,
        })
    }

    /// Convenience constructor that places all three directories under `root`.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            downloads_dir: root.join(DEFAULT_DOWNLOADS_DIR),
            extracted_dir: root.join(DEFAULT_EXTRACTED_DIR),
            databases_dir: root.join(DEFAULT_DATABASES_DIR),
            ..Self::default()
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.databases_dir.join(&self.database_file)
    }
}
