//! Per-collection write serialization
//!
//! Every collection has one FIFO lock. A write section holds it across
//! load, mutate and commit, so the next queued writer always loads what the
//! previous one committed. Readers never take the lock; the atomic rename
//! guarantees they see a complete file.
//!
//! The commit runs on the blocking pool and owns the lock guard. If the
//! caller stops waiting after the section has reached its commit, the write
//! still completes and the lock is released only afterwards.
//!
//! The first commit of each collection also sweeps temp files older than
//! [`persist::STALE_TEMP_AGE`]. Opening a store or reading never deletes
//! anything.

use super::collection::{Collection, CollectionKind};
use super::persist;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// State guarded by one collection's write lock
#[derive(Debug, Default)]
struct WriteState {
    /// Stale temp files were swept by an earlier commit
    swept: bool,
}

/// Lock table for the fixed set of collections, owned by a store instance
#[derive(Debug)]
pub struct WriteSerializer {
    /// Indexed by [`CollectionKind::index`]
    locks: [Arc<Mutex<WriteState>>; CollectionKind::ALL.len()],
}

impl Default for WriteSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteSerializer {
    pub fn new() -> Self {
        Self {
            locks: std::array::from_fn(|_| Arc::new(Mutex::new(WriteState::default()))),
        }
    }

    async fn acquire(&self, kind: CollectionKind) -> OwnedMutexGuard<WriteState> {
        let lock = Arc::clone(&self.locks[kind.index()]);
        let guard = lock.lock_owned().await;
        tracing::trace!(collection = %kind, "acquired write lock");
        guard
    }

    /// Run `op` with exclusive write access to one collection
    ///
    /// `op` gets the freshly loaded snapshot. If it returns `Ok` and changed
    /// the snapshot, the snapshot is committed before the lock is released.
    /// If it returns `Err`, nothing is written and the error is returned.
    pub async fn with_exclusive_write<T, F>(&self, kind: CollectionKind, path: &Path, op: F) -> Result<T>
    where
        F: FnOnce(&mut Collection) -> Result<T>,
    {
        let guard = self.acquire(kind).await;

        let mut collection = persist::load(kind, path).await?;
        let output = op(&mut collection)?;

        if collection.is_dirty() {
            let bytes = collection.encode()?;
            commit_detached(path.to_path_buf(), bytes, guard).await?;
        }

        Ok(output)
    }
}

async fn commit_detached(path: PathBuf, bytes: Vec<u8>, mut guard: OwnedMutexGuard<WriteState>) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        persist::commit(&path, &bytes)?;
        if !guard.swept {
            guard.swept = true;
            if let Err(e) = persist::sweep_temp_files(&path, persist::STALE_TEMP_AGE) {
                tracing::warn!(path = %path.display(), error = %e, "temp file sweep failed");
            }
        }
        Ok(())
    })
    .await
    .map_err(|e| Error::Other(format!("commit task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::record::{Fields, Record};
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_first_commit_sweeps_only_stale_temp_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ComplaintsStorage.json");
        let abandoned = tmp.path().join("ComplaintsStorage.json.9.0.tmp");
        let in_flight = tmp.path().join("ComplaintsStorage.json.9.1.tmp");
        std::fs::write(&abandoned, "{").unwrap();
        std::fs::write(&in_flight, "{").unwrap();
        File::options()
            .write(true)
            .open(&abandoned)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(3600))
            .unwrap();
        let serializer = WriteSerializer::new();

        // A section that writes nothing does not sweep
        serializer
            .with_exclusive_write(CollectionKind::Complaints, &path, |c| Ok(c.len()))
            .await
            .unwrap();
        assert!(abandoned.exists());

        serializer
            .with_exclusive_write(CollectionKind::Complaints, &path, |c| {
                Ok(c.insert(Record::new(Fields::new())).id)
            })
            .await
            .unwrap();
        assert!(!abandoned.exists());
        assert!(in_flight.exists());
    }

    #[tokio::test]
    async fn test_error_skips_commit() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ComplaintsStorage.json");
        let serializer = WriteSerializer::new();

        let result: Result<()> = serializer
            .with_exclusive_write(CollectionKind::Complaints, &path, |c| {
                c.insert(Record::new(Fields::new()));
                Err(Error::Other("abort".into()))
            })
            .await;

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_clean_section_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ComplaintsStorage.json");
        let serializer = WriteSerializer::new();

        let len = serializer
            .with_exclusive_write(CollectionKind::Complaints, &path, |c| Ok(c.len()))
            .await
            .unwrap();

        assert_eq!(len, 0);
        assert!(!path.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_collections_do_not_block_each_other() {
        let tmp = TempDir::new().unwrap();
        let serializer = Arc::new(WriteSerializer::new());

        // Hold the bookings lock while a users write runs to completion
        let held = serializer.acquire(CollectionKind::Bookings).await;
        let users_path = tmp.path().join("UserStorage.json");
        let write = serializer.with_exclusive_write(CollectionKind::Users, &users_path, |c| {
            Ok(c.insert(Record::new(Fields::new())).id)
        });
        let id = tokio::time::timeout(Duration::from_secs(5), write)
            .await
            .expect("users write blocked by bookings lock")
            .unwrap();
        drop(held);

        assert_eq!(id, 1);
    }
}
