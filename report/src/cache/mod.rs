//! Snapshot store - keep fetched records as Parquet files and reload them.
//!
//! Snapshots live in one directory and are named
//! `dados_vendas_{YYYYmmdd_HHMMSS}.parquet`. Listing is newest first by
//! modification time.

pub mod columnar;

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SourceError, SourceResult};
use crate::logs::{log_info, log_success};
use crate::models::RecordTable;

pub use columnar::{load_cached_table, save_table};

/// File name prefix of saved snapshots
pub const SNAPSHOT_PREFIX: &str = "dados_vendas";

/// Save `table` as a new snapshot in `dir`
pub fn save_snapshot(table: &RecordTable, dir: impl AsRef<Path>) -> SourceResult<PathBuf> {
    SnapshotStore::with_dir(dir).save(table)
}

/// A snapshot file with metadata
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    /// File name, used as the snapshot identifier
    pub name: String,
    /// Full path
    pub path: PathBuf,
    /// Last modification time
    pub modified: DateTime<Local>,
    /// File size in bytes
    pub size_bytes: u64,
}

/// Directory of Parquet snapshots
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Store rooted at `dir`; the directory is created on first save
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All `.parquet` files in the directory, newest first
    pub fn list(&self) -> SourceResult<Vec<SnapshotInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|e| e == "parquet") {
                continue;
            }
            let metadata = entry.metadata()?;
            snapshots.push(SnapshotInfo {
                name: entry.file_name().to_string_lossy().to_string(),
                modified: DateTime::<Local>::from(metadata.modified()?),
                size_bytes: metadata.len(),
                path,
            });
        }

        snapshots.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
        Ok(snapshots)
    }

    /// The most recent snapshot
    pub fn latest(&self) -> SourceResult<SnapshotInfo> {
        self.list()?
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::SnapshotNotFound(self.dir.display().to_string()))
    }

    /// A snapshot by file name
    pub fn get(&self, name: &str) -> SourceResult<SnapshotInfo> {
        self.list()?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SourceError::SnapshotNotFound(name.to_string()))
    }

    /// Save `table` as a new timestamped snapshot and return its path
    pub fn save(&self, table: &RecordTable) -> SourceResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let path = self.next_path();
        log_info(format!("Saving {} records to {}...", table.num_rows(), path.display()));
        save_table(table, &path)?;
        log_success(format!("Snapshot saved: {}", path.display()));
        Ok(path)
    }

    /// Load a snapshot by file name
    pub fn load(&self, name: &str) -> SourceResult<RecordTable> {
        let info = self.get(name)?;
        load_cached_table(&info.path)
    }

    /// Delete a snapshot by file name
    pub fn delete(&self, name: &str) -> SourceResult<()> {
        let info = self.get(name)?;
        fs::remove_file(&info.path)?;
        Ok(())
    }

    /// Timestamped path that does not exist yet
    fn next_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let mut path = self.dir.join(format!("{}_{}.parquet", SNAPSHOT_PREFIX, stamp));
        let mut n = 2;
        while path.exists() {
            path = self.dir.join(format!("{}_{}_{}.parquet", SNAPSHOT_PREFIX, stamp, n));
            n += 1;
        }
        path
    }
}
