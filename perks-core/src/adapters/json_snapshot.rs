//! JSON snapshot store - durable account state on the local filesystem
//!
//! One snapshot file per account (`<account_id>.json`) inside the data
//! directory. Writes go to a temp file in the same directory and are
//! atomically persisted over the target, so a crash mid-write leaves the
//! previous snapshot intact. An advisory lock on the directory serializes
//! writers across processes (app + CLI competing for the same account).

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;

use crate::domain::result::{Error, Result};
use crate::ports::{Snapshot, SnapshotStore};

pub struct JsonSnapshotStore {
    dir: PathBuf,
    /// Held for the lifetime of the store; released on drop
    _lock: File,
}

impl JsonSnapshotStore {
    /// Open (and create if needed) a snapshot directory, taking the
    /// exclusive directory lock. Fails if another store instance holds it.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let lock_path = dir.join(".perks.lock");
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        lock.try_lock_exclusive().map_err(|e| {
            Error::Storage(format!(
                "snapshot directory {} is locked by another process: {}",
                dir.display(),
                e
            ))
        })?;

        Ok(Self {
            dir: dir.to_path_buf(),
            _lock: lock,
        })
    }

    fn snapshot_path(&self, account_id: &str) -> PathBuf {
        // Account ids come from the auth layer; keep the filename safe anyway
        let safe: String = account_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let path = self.snapshot_path(&snapshot.account_id);
        let json = serde_json::to_string_pretty(snapshot)?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;

        Ok(())
    }

    fn load(&self, account_id: &str) -> Result<Option<Snapshot>> {
        let path = self.snapshot_path(account_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        match serde_json::from_str::<Snapshot>(&content) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => Err(Error::StaleSnapshot(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }
}
