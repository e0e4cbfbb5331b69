//! Zip extraction for release and feed archives.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::ArchiveError;

/// Extracts every entry of `archive` into `dest`, creating it if needed.
///
/// Entries whose names would land outside `dest` are skipped. Returns the
/// number of files written.
#[tracing::instrument(skip_all, fields(archive = %archive.display(), dest = %dest.display()))]
pub fn extract(archive: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let file = File::open(archive).map_err(|source| ArchiveError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let invalid = |source| ArchiveError::Invalid {
        path: archive.to_path_buf(),
        source,
    };
    let mut zip = ZipArchive::new(file).map_err(invalid)?;

    let write_err = |path: &Path, source| ArchiveError::Write {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(dest).map_err(|e| write_err(dest, e))?;

    let mut written = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(invalid)?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "Skipping archive entry outside destination");
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| write_err(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| write_err(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| write_err(&out_path, e))?;
        written += 1;
    }

    debug!(written, "Archive extracted");
    Ok(written)
}
