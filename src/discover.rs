//! Release, feed and table-file discovery.
//!
//! Every listing is non-recursive and sorted lexically so runs over the same
//! input produce the same database.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::DiscoveryError;

const ARCHIVE_EXTENSION: &str = "zip";
const TABLE_EXTENSION: &str = "txt";

/// A top-level release archive found in the downloads directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Archive file name without the `.zip` extension.
    pub name: String,
    pub path: PathBuf,
}

/// One agency's nested archive inside an extracted release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub name: String,
    pub release: String,
    pub archive: PathBuf,
    /// Where the archive gets extracted: a sibling directory named after its stem.
    pub dir: PathBuf,
}

/// A `<entity>.txt` file inside an extracted feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFile {
    /// Destination table name, the file stem (`stops`, `stop_times`, ...).
    pub entity: String,
    pub path: PathBuf,
}

/// Lists the release archives directly inside `downloads_dir`.
pub fn discover_releases(downloads_dir: &Path) -> Result<Vec<Release>, DiscoveryError> {
    if !downloads_dir.is_dir() {
        return Err(DiscoveryError::NotFound(downloads_dir.to_path_buf()));
    }

    let releases = list_with_extension(downloads_dir, ARCHIVE_EXTENSION)?
        .into_iter()
        .filter_map(|path| {
            let name = file_stem(&path)?;
            Some(Release { name, path })
        })
        .collect::<Vec<_>>();

    debug!(dir = %downloads_dir.display(), count = releases.len(), "Discovered releases");
    Ok(releases)
}

/// Lists the feed archives directly inside an extracted release directory.
pub fn discover_feeds(release_dir: &Path, release: &str) -> Result<Vec<Feed>, DiscoveryError> {
    let feeds = list_with_extension(release_dir, ARCHIVE_EXTENSION)?
        .into_iter()
        .filter_map(|archive| {
            let name = file_stem(&archive)?;
            Some(Feed {
                dir: archive.with_file_name(&name),
                name,
                release: release.to_string(),
                archive,
            })
        })
        .collect::<Vec<_>>();

    debug!(release, count = feeds.len(), "Discovered feeds");
    Ok(feeds)
}

/// Lists the table files directly inside an extracted feed directory.
pub fn discover_table_files(feed_dir: &Path) -> Result<Vec<TableFile>, DiscoveryError> {
    let files = list_with_extension(feed_dir, TABLE_EXTENSION)?
        .into_iter()
        .filter_map(|path| {
            let entity = file_stem(&path)?;
            Some(TableFile { entity, path })
        })
        .collect();

    Ok(files)
}

fn list_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let unreadable = |source| DiscoveryError::Unreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
