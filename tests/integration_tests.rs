use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::Path;

use gtfs_loader::config::{Config, ErrorPolicy};
use gtfs_loader::error::GtfsError;
use gtfs_loader::pipeline::run;
use gtfs_loader::store::{GtfsStore, PatchOutcome};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

fn zip_bytes(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buf));
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

/// Writes `<downloads>/<release>.zip` holding one nested zip per feed.
fn write_release(downloads: &Path, release: &str, feeds: &[(&str, Vec<(&str, &str)>)]) {
    let feed_zips: Vec<(String, Vec<u8>)> = feeds
        .iter()
        .map(|(feed, files)| {
            let entries: Vec<(&str, Vec<u8>)> = files
                .iter()
                .map(|(name, content)| (*name, content.as_bytes().to_vec()))
                .collect();
            (format!("{feed}.zip"), zip_bytes(&entries))
        })
        .collect();
    let entries: Vec<(&str, Vec<u8>)> = feed_zips
        .iter()
        .map(|(name, bytes)| (name.as_str(), bytes.clone()))
        .collect();

    let mut file = File::create(downloads.join(format!("{release}.zip"))).unwrap();
    file.write_all(&zip_bytes(&entries)).unwrap();
}

fn setup() -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let config = Config::rooted_at(dir.path());
    fs::create_dir_all(&config.downloads_dir).unwrap();
    (dir, config)
}

fn open(config: &Config) -> GtfsStore {
    GtfsStore::open(&config.database_path()).unwrap()
}

fn column_values(store: &GtfsStore, sql: &str) -> Vec<String> {
    let mut stmt = store.connection().prepare(sql).unwrap();
    stmt.query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn test_single_release_is_tagged() {
    let (_dir, config) = setup();
    write_release(
        &config.downloads_dir,
        "A",
        &[("agency1", vec![("stops.txt", "stop_id,stop_name\n1,Main St\n2,Elm St\n")])],
    );

    let summary = run(&config).unwrap();

    let store = open(&config);
    assert_eq!(
        store.column_names("stops").unwrap().unwrap(),
        vec!["stop_id", "stop_name", "release_name"]
    );
    assert_eq!(store.row_count("stops").unwrap(), 2);
    assert_eq!(
        column_values(&store, "SELECT release_name FROM stops"),
        vec!["A", "A"]
    );
    assert_eq!(summary.releases_loaded, 1);
    assert_eq!(summary.feeds_loaded, 1);
    assert_eq!(summary.files_loaded, 1);
    assert_eq!(summary.rows_loaded, 2);
}

#[test]
fn test_later_release_grows_schema() {
    let (_dir, config) = setup();
    write_release(
        &config.downloads_dir,
        "A",
        &[("agency1", vec![("stops.txt", "stop_id,stop_name\n1,Main St\n2,Elm St\n")])],
    );
    write_release(
        &config.downloads_dir,
        "B",
        &[(
            "agency1",
            vec![("stops.txt", "stop_id,stop_name,wheelchair_boarding\n3,Oak Ave,1\n")],
        )],
    );

    run(&config).unwrap();

    let store = open(&config);
    assert_eq!(
        store.column_names("stops").unwrap().unwrap(),
        vec!["stop_id", "stop_name", "release_name", "wheelchair_boarding"]
    );
    assert_eq!(
        column_values(
            &store,
            "SELECT wheelchair_boarding FROM stops WHERE release_name = 'A'"
        ),
        vec!["", ""]
    );
    assert_eq!(
        column_values(
            &store,
            "SELECT wheelchair_boarding FROM stops WHERE release_name = 'B'"
        ),
        vec!["1"]
    );
}

#[test]
fn test_timepoint_is_added_when_never_provided() {
    let (_dir, config) = setup();
    write_release(
        &config.downloads_dir,
        "2024-01",
        &[(
            "metro",
            vec![("stop_times.txt", "trip_id,stop_id,stop_sequence\nT1,S1,1\nT1,S2,2\n")],
        )],
    );

    let summary = run(&config).unwrap();

    assert_eq!(summary.timepoint, Some(PatchOutcome::Added));
    let store = open(&config);
    assert_eq!(
        column_values(&store, "SELECT timepoint FROM stop_times"),
        vec!["", ""]
    );
}

#[test]
fn test_no_stop_times_means_no_patch() {
    let (_dir, config) = setup();
    write_release(
        &config.downloads_dir,
        "A",
        &[("agency1", vec![("routes.txt", "route_id\nR1\n")])],
    );

    let summary = run(&config).unwrap();

    assert_eq!(summary.timepoint, Some(PatchOutcome::TableMissing));
    assert!(!open(&config).table_exists("stop_times").unwrap());
}

#[test]
fn test_multiple_feeds_share_tables() {
    let (_dir, config) = setup();
    write_release(
        &config.downloads_dir,
        "A",
        &[
            ("agency1", vec![("routes.txt", "route_id,route_type\nR1,3\n")]),
            (
                "agency2",
                vec![
                    ("routes.txt", "route_id,route_color\nR2,FF0000\n"),
                    ("agency.txt", "agency_id\nX\n"),
                ],
            ),
        ],
    );

    let summary = run(&config).unwrap();

    let store = open(&config);
    assert_eq!(store.table_names().unwrap(), vec!["agency", "routes"]);
    assert_eq!(store.row_count("routes").unwrap(), 2);
    assert_eq!(summary.feeds_loaded, 2);
    assert_eq!(summary.tables["routes"].columns, 4);
}

#[test]
fn test_rerun_starts_from_scratch() {
    let (_dir, config) = setup();
    write_release(
        &config.downloads_dir,
        "A",
        &[("agency1", vec![("stops.txt", "stop_id\n1\n")])],
    );

    run(&config).unwrap();
    run(&config).unwrap();

    assert_eq!(open(&config).row_count("stops").unwrap(), 1);
}

#[test]
fn test_corrupt_release_is_skipped() {
    let (_dir, config) = setup();
    fs::write(config.downloads_dir.join("A.zip"), b"not a zip").unwrap();
    write_release(
        &config.downloads_dir,
        "B",
        &[("agency1", vec![("stops.txt", "stop_id\n1\n")])],
    );

    let summary = run(&config).unwrap();

    assert_eq!(summary.releases_skipped, 1);
    assert_eq!(summary.releases_loaded, 1);
    assert_eq!(
        column_values(&open(&config), "SELECT release_name FROM stops"),
        vec!["B"]
    );
}

#[test]
fn test_corrupt_release_aborts_under_abort_policy() {
    let (_dir, mut config) = setup();
    config.error_policy = ErrorPolicy::Abort;
    fs::write(config.downloads_dir.join("A.zip"), b"not a zip").unwrap();

    let err = run(&config).unwrap_err();

    assert!(matches!(err, GtfsError::Archive(_)));
}

#[test]
fn test_malformed_file_is_skipped() {
    let (_dir, config) = setup();
    write_release(
        &config.downloads_dir,
        "A",
        &[(
            "agency1",
            vec![
                ("routes.txt", "route_id\nR1,extra\n"),
                ("stops.txt", "stop_id\n1\n"),
            ],
        )],
    );

    let summary = run(&config).unwrap();

    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.files_loaded, 1);
    let store = open(&config);
    assert!(!store.table_exists("routes").unwrap());
    assert!(store.table_exists("stops").unwrap());
}

#[test]
fn test_corrupt_feed_is_skipped() {
    let (_dir, config) = setup();
    let good = zip_bytes(&[("stops.txt", b"stop_id\n1\n".to_vec())]);
    let release = zip_bytes(&[("bad.zip", b"garbage".to_vec()), ("good.zip", good)]);
    fs::write(config.downloads_dir.join("A.zip"), release).unwrap();

    let summary = run(&config).unwrap();

    assert_eq!(summary.releases_loaded, 1);
    assert_eq!(summary.feeds_skipped, 1);
    assert_eq!(summary.feeds_loaded, 1);
    assert_eq!(
        column_values(&open(&config), "SELECT release_name FROM stops"),
        vec!["A"]
    );
}

#[test]
fn test_malformed_file_aborts_under_abort_policy() {
    let (_dir, mut config) = setup();
    config.error_policy = ErrorPolicy::Abort;
    write_release(
        &config.downloads_dir,
        "A",
        &[("agency1", vec![("routes.txt", "route_id\nR1,extra\n")])],
    );

    let err = run(&config).unwrap_err();

    assert!(matches!(err, GtfsError::Parse { .. }));
}

#[test]
fn test_missing_downloads_dir_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = Config::rooted_at(dir.path());

    let err = run(&config).unwrap_err();

    assert!(matches!(err, GtfsError::Discovery(_)));
}
