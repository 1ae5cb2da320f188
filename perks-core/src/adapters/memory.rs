//! In-memory snapshot store for unit tests

use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::result::{Error, Result};
use crate::ports::{Snapshot, SnapshotStore};

#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<String, Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        self.snapshots
            .lock()
            .map_err(|e| Error::Storage(format!("memory store lock poisoned: {}", e)))?
            .insert(snapshot.account_id.clone(), snapshot.clone());
        Ok(())
    }

    fn load(&self, account_id: &str) -> Result<Option<Snapshot>> {
        Ok(self
            .snapshots
            .lock()
            .map_err(|e| Error::Storage(format!("memory store lock poisoned: {}", e)))?
            .get(account_id)
            .cloned())
    }
}
