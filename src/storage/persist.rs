//! Disk I/O for collection snapshots: self-healing load and atomic commit.
//!
//! A commit writes the full snapshot to a temp file next to the canonical
//! file, fsyncs it, then renames it over the canonical path. The rename is
//! the single point of visibility: readers see either the previous complete
//! file or the new complete file.
//!
//! Temp files are named `<file>.<pid>.<seq>.tmp`. A crash between write and
//! rename can leave one behind; [`sweep_temp_files`] removes the ones older
//! than a given age and `load` never looks at them.

use super::collection::{Collection, CollectionKind};
use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use walkdir::WalkDir;

const TEMP_SUFFIX: &str = ".tmp";

/// A temp file this old belongs to a commit that is not coming back.
/// Commits finish in well under a second; this leaves room for slow disks
/// and for other processes sharing the directory.
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(10 * 60);

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Load a snapshot from disk
///
/// A missing, empty or malformed file yields an empty collection and the
/// file is left as it is; the next commit replaces it. Any other I/O failure
/// (permissions, a directory in the way) is returned.
pub async fn load(kind: CollectionKind, path: &Path) -> Result<Collection> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Collection::empty(kind)),
        Err(e) => return Err(Error::storage(path, e)),
    };

    match Collection::decode(kind, &bytes) {
        Ok(collection) => Ok(collection),
        Err(issue) => {
            tracing::warn!(
                collection = %kind,
                path = %path.display(),
                %issue,
                "treating unreadable snapshot as empty"
            );
            Ok(Collection::empty(kind))
        }
    }
}

/// Atomically replace the file at `path` with `bytes`
pub fn commit(path: &Path, bytes: &[u8]) -> Result<()> {
    commit_staged(path, bytes, |_| Ok(()))
}

/// Commit with a hook that runs after the temp file is durable and before
/// the rename. A hook failure aborts the commit like any other write error.
fn commit_staged<F>(path: &Path, bytes: &[u8], before_rename: F) -> Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let dir = parent_dir(path);
    fs::create_dir_all(&dir).map_err(|e| Error::storage(&dir, e))?;

    let tmp = temp_path(path);
    let staged = write_synced(&tmp, bytes)
        .and_then(|()| before_rename(&tmp))
        .and_then(|()| fs::rename(&tmp, path));

    if let Err(e) = staged {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %tmp.display(), error = %cleanup, "could not remove temp file");
            }
        }
        return Err(Error::storage(path, e));
    }

    sync_dir(&dir);
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "committed snapshot");
    Ok(())
}

/// Remove temp files of `path` last modified at least `min_age` ago
///
/// Returns how many were removed. Younger temp files may belong to a commit
/// that is still running and are left alone.
pub fn sweep_temp_files(path: &Path, min_age: Duration) -> Result<usize> {
    let dir = parent_dir(path);
    if !dir.is_dir() {
        return Ok(0);
    }
    let Some(prefix) = path.file_name().map(|n| format!("{}.", n.to_string_lossy())) else {
        return Ok(0);
    };

    let mut removed = 0;
    for entry in WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let name = entry.file_name().to_string_lossy();
        if !entry.file_type().is_file() || !name.starts_with(&prefix) || !name.ends_with(TEMP_SUFFIX) {
            continue;
        }
        if !min_age.is_zero() && !older_than(&entry, min_age) {
            tracing::trace!(path = %entry.path().display(), "leaving recent temp file");
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            // Renamed into place or swept by someone else meanwhile
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::storage(entry.path(), e)),
        }
    }

    if removed > 0 {
        tracing::info!(path = %path.display(), removed, "swept stale temp files");
    }
    Ok(removed)
}

/// An unreadable or future mtime counts as recent
fn older_than(entry: &walkdir::DirEntry, min_age: Duration) -> bool {
    entry
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age >= min_age)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "collection".to_string());
    path.with_file_name(format!("{}.{}.{}{}", name, std::process::id(), seq, TEMP_SUFFIX))
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Persist the rename itself
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!(path = %dir.display(), error = %e, "directory fsync failed");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
