//! Store configuration
//!
//! The only thing the store needs to know is where each collection lives.
//! By default every collection is a file in one data directory:
//!
//! ```yaml
//! # rentdb.yaml
//! data_dir: ./Storage
//! files:
//!   bookings: bookings-2024.json   # relative to data_dir
//!   users: /srv/shared/users.json  # absolute paths are used as-is
//! ```

use crate::error::{Error, Result};
use crate::storage::collection::CollectionKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default config file name looked up inside a data directory
pub const CONFIG_FILE_NAME: &str = "rentdb.yaml";

/// Where the collection files live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the collection files
    pub data_dir: PathBuf,
    /// Per-collection file overrides
    #[serde(default)]
    pub files: HashMap<CollectionKind, PathBuf>,
}

impl StoreConfig {
    /// Every collection under its default file name in `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            files: HashMap::new(),
        }
    }

    /// Override the file for one collection
    pub fn with_file(mut self, kind: CollectionKind, path: impl Into<PathBuf>) -> Self {
        self.files.insert(kind, path.into());
        self
    }

    /// Load a YAML config file
    ///
    /// A relative `data_dir` is resolved against the directory containing
    /// the config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config: StoreConfig = serde_yaml::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if config.data_dir.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.data_dir = base.join(&config.data_dir);
        }
        Ok(config)
    }

    /// Use `<dir>/rentdb.yaml` when present, otherwise defaults rooted at `dir`
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::new(dir))
        }
    }

    /// Resolved path of a collection file
    pub fn path_for(&self, kind: CollectionKind) -> PathBuf {
        match self.files.get(&kind) {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.data_dir.join(path),
            None => self.data_dir.join(kind.default_file_name()),
        }
    }
}
