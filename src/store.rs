use crate::error::{PageProfitError, Result};
use crate::schema::{Settings, Snapshot};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fixed blob-store keys. Each value is one opaque JSON string the core
/// serializes and deserializes itself; the store assumes nothing beyond
/// last-write-wins.
pub const SNAPSHOTS_KEY: &str = "page-profit/snapshots";
pub const SETTINGS_KEY: &str = "page-profit/settings";

/// The persistence boundary: two opaque key-value operations owned by the
/// caller. Failures propagate per operation; the core never retries.
pub trait BlobStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// In-memory reference implementation, also the test double.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: HashMap<String, String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Ordered collection of snapshots, newest import first. Index 0 is "latest"
/// by recency of import, never by comparing dates: importing a snapshot with
/// an earlier date than existing ones still makes it latest. Snapshots are
/// only ever added or removed whole, never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotStore {
    snapshots: Vec<Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepend(&mut self, snapshot: Snapshot) {
        debug!("store: prepending snapshot {} ({})", snapshot.id, snapshot.label);
        self.snapshots.insert(0, snapshot);
    }

    pub fn remove(&mut self, id: &str) -> Result<Snapshot> {
        let idx = self
            .snapshots
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| PageProfitError::SnapshotNotFound(id.to_string()))?;
        Ok(self.snapshots.remove(idx))
    }

    pub fn get(&self, id: &str) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.id == id)
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Loads the snapshot store from the blob boundary; an absent key is an
/// empty store, a present-but-corrupt payload is an error.
pub fn load_store(blob: &impl BlobStore) -> Result<SnapshotStore> {
    match blob.get(SNAPSHOTS_KEY)? {
        Some(payload) => {
            let store: SnapshotStore = serde_json::from_str(&payload)?;
            info!("loaded {} snapshots", store.len());
            Ok(store)
        }
        None => Ok(SnapshotStore::new()),
    }
}

pub fn save_store(blob: &mut impl BlobStore, store: &SnapshotStore) -> Result<()> {
    let payload = serde_json::to_string(store)?;
    blob.set(SNAPSHOTS_KEY, &payload)
}

pub fn load_settings(blob: &impl BlobStore) -> Result<Settings> {
    match blob.get(SETTINGS_KEY)? {
        Some(payload) => Ok(serde_json::from_str(&payload)?),
        None => Ok(Settings::default()),
    }
}

pub fn save_settings(blob: &mut impl BlobStore, settings: &Settings) -> Result<()> {
    let payload = serde_json::to_string(settings)?;
    blob.set(SETTINGS_KEY, &payload)
}
