//! CLI entry point for the GTFS release loader.
//!
//! Running with no arguments consolidates every release archive in the
//! downloads directory into a single SQLite database. Directories come from
//! `GTFS_*` environment variables (or `.env`) and may be overridden here.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use gtfs_loader::config::{Config, ErrorPolicy};
use gtfs_loader::output::{append_record, print_json, print_pretty};
use gtfs_loader::pipeline;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_loader")]
#[command(about = "Consolidate GTFS release archives into one SQLite database", long_about = None)]
struct Cli {
    /// Directory containing the release zip files
    #[arg(long, value_name = "DIR")]
    downloads_dir: Option<PathBuf>,

    /// Directory to extract releases into (wiped on every run)
    #[arg(long, value_name = "DIR")]
    extracted_dir: Option<PathBuf>,

    /// Directory holding the output database (wiped on every run)
    #[arg(long, value_name = "DIR")]
    databases_dir: Option<PathBuf>,

    /// What to do with releases, feeds or files that cannot be read
    #[arg(long, value_enum)]
    on_error: Option<ErrorPolicy>,

    /// Log the run summary as JSON when finished
    #[arg(long, default_value_t = false)]
    json: bool,

    /// CSV file to append a one-line run record to
    #[arg(long, value_name = "FILE")]
    history: Option<PathBuf>,
}

impl Cli {
    fn apply(self, mut config: Config) -> Config {
        if let Some(dir) = self.downloads_dir {
            config.downloads_dir = dir;
        }
        if let Some(dir) = self.extracted_dir {
            config.extracted_dir = dir;
        }
        if let Some(dir) = self.databases_dir {
            config.databases_dir = dir;
        }
        if let Some(policy) = self.on_error {
            config.error_policy = policy;
        }
        config
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_loader.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_loader.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    let history = cli.history.clone();

    let config = cli.apply(Config::from_env()?);
    info!(
        downloads = %config.downloads_dir.display(),
        extracted = %config.extracted_dir.display(),
        databases = %config.databases_dir.display(),
        policy = ?config.error_policy,
        "Starting GTFS load"
    );

    let summary = pipeline::run(&config).context("GTFS load failed")?;

    print_pretty(&summary);
    if json {
        print_json(&summary)?;
    }
    if let Some(path) = history {
        append_record(&path, &summary)
            .with_context(|| format!("failed to append run record to {}", path.display()))?;
    }

    Ok(())
}
