//! rentdb - JSON-file record store for a property-rental application
//!
//! Users, properties, bookings, complaints and notifications each live in one
//! JSON file and are mutated by many concurrent requests.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          rentdb Store                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │   Entities (bookings, properties, users, complaints, ...) │  │
//! │  └─────────────────────────────┬─────────────────────────────┘  │
//! │                                │                                │
//! │                                ▼                                │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │  Write Serializer (one FIFO lock per collection)          │  │
//! │  │    load ─► Id Allocator ─► Overlap Validator ─► mutate    │  │
//! │  └─────────────────────────────┬─────────────────────────────┘  │
//! │                                │                                │
//! │                                ▼                                │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │  Atomic Persister (temp file + fsync + rename)            │  │
//! │  └─────────────────────────────┬─────────────────────────────┘  │
//! │                                │                                │
//! │                                ▼                                │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │  File System: { "bookings": [ ... ] } per collection      │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Consistency
//!
//! Writes to one collection are linearized. Writes to different collections
//! are independent, and a reader may see a property and its bookings from
//! slightly different points in time. The locks are in-process only: two
//! processes sharing the same files need a file lock or a single writer.

pub mod config;
pub mod entities;
pub mod error;
pub mod overlap;
pub mod storage;
pub mod validation;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use overlap::DateRange;
pub use storage::collection::{Collection, CollectionKind};
pub use storage::record::{Fields, Record};

use std::path::PathBuf;
use storage::persist;
use storage::serializer::WriteSerializer;

/// The main store handle
///
/// Each instance owns its own locks; share one instance (e.g. behind an
/// `Arc`) between all tasks that touch the same files.
#[derive(Debug)]
pub struct Store {
    config: StoreConfig,
    serializer: WriteSerializer,
}

impl Store {
    /// Open a store, creating the data directory if needed
    ///
    /// Opening never touches collection files. Temp files left by crashed
    /// commits are swept by the first commit of each collection once they
    /// are older than [`persist::STALE_TEMP_AGE`].
    pub async fn open(config: StoreConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|e| Error::storage(&config.data_dir, e))?;

        let store = Self {
            config,
            serializer: WriteSerializer::new(),
        };
        tracing::info!(data_dir = %store.config.data_dir.display(), "opened store");
        Ok(store)
    }

    /// Open a store with default file names under `data_dir`
    pub async fn open_dir(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open(StoreConfig::new(data_dir)).await
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// File backing a collection
    pub fn path(&self, kind: CollectionKind) -> PathBuf {
        self.config.path_for(kind)
    }

    /// Read the latest committed snapshot without taking any lock
    pub async fn load(&self, kind: CollectionKind) -> Result<Collection> {
        persist::load(kind, &self.path(kind)).await
    }

    /// Run `op` as the only writer of `kind`
    ///
    /// `op` receives a freshly loaded snapshot. When it returns `Ok` the
    /// snapshot is committed (if it changed) before the next writer runs;
    /// when it returns `Err` nothing is written. Validation that must hold at
    /// commit time, like booking overlap, belongs inside `op`.
    pub async fn with_exclusive_write<T, F>(&self, kind: CollectionKind, op: F) -> Result<T>
    where
        F: FnOnce(&mut Collection) -> Result<T>,
    {
        self.serializer
            .with_exclusive_write(kind, &self.path(kind), op)
            .await
    }

    /// Insert a record and return it with its new id
    pub async fn insert(&self, kind: CollectionKind, fields: Fields) -> Result<Record> {
        self.with_exclusive_write(kind, |c| Ok(c.insert(Record::new(fields)).clone()))
            .await
    }

    /// Apply field-level changes to one record
    pub async fn update<F>(&self, kind: CollectionKind, id: u64, mutator: F) -> Result<Record>
    where
        F: FnOnce(&mut Fields),
    {
        self.with_exclusive_write(kind, |c| c.update(id, mutator).cloned())
            .await
    }

    /// Soft transition of a status field
    pub async fn mark_status(
        &self,
        kind: CollectionKind,
        id: u64,
        field: &str,
        value: impl Into<serde_json::Value>,
    ) -> Result<Record> {
        let value = value.into();
        self.with_exclusive_write(kind, |c| c.mark_status(id, field, value).cloned())
            .await
    }

    /// Physically remove a record; `false` if it did not exist
    pub async fn remove(&self, kind: CollectionKind, id: u64) -> Result<bool> {
        self.with_exclusive_write(kind, |c| Ok(c.remove(id))).await
    }

    /// Look up one record in the latest snapshot
    pub async fn get(&self, kind: CollectionKind, id: u64) -> Result<Option<Record>> {
        Ok(self.load(kind).await?.get(id).cloned())
    }

    /// Records of the latest snapshot matching `predicate`
    pub async fn find_all<P>(&self, kind: CollectionKind, predicate: P) -> Result<Vec<Record>>
    where
        P: Fn(&Record) -> bool,
    {
        let collection = self.load(kind).await?;
        Ok(collection.find_all(predicate).cloned().collect())
    }

    /// Remove temp files older than [`persist::STALE_TEMP_AGE`] next to
    /// every collection file
    pub async fn sweep_temp_files(&self) -> Result<usize> {
        let paths: Vec<PathBuf> = CollectionKind::ALL.iter().map(|k| self.path(*k)).collect();
        tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut total = 0;
            for path in &paths {
                total += persist::sweep_temp_files(path, persist::STALE_TEMP_AGE)?;
            }
            Ok(total)
        })
        .await
        .map_err(|e| Error::Other(format!("sweep task failed: {}", e)))?
    }

    /// Per-collection record counts of the latest snapshots
    pub async fn status(&self) -> Result<Vec<CollectionStatus>> {
        let mut statuses = Vec::with_capacity(CollectionKind::ALL.len());
        for kind in CollectionKind::ALL {
            let path = self.path(kind);
            let records = self.load(kind).await?.len();
            statuses.push(CollectionStatus {
                kind,
                exists: path.is_file(),
                path,
                records,
            });
        }
        Ok(statuses)
    }
}

/// Summary of one collection file
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionStatus {
    pub kind: CollectionKind,
    pub path: PathBuf,
    pub exists: bool,
    pub records: usize,
}
