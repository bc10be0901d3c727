pub mod disk;
pub mod memory;
pub mod snapshot;

use crate::core::cache::{KeyValueCollection, Store};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions, PersistMode};
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, warn};

/// Registry of named collections backed by one fjall keyspace.
///
/// Persistent collections silently degrade to memory when the keyspace
/// could not be opened, so a broken cache directory never fails a run.
pub struct KeyValueStore {
    collections: Mutex<HashMap<String, Arc<dyn KeyValueCollection>>>,
    keyspace: Option<Keyspace>,
}

impl KeyValueStore {
    pub fn open(path: &Path) -> Self {
        let keyspace = match fjall::Config::new(path).open() {
            Ok(keyspace) => Some(keyspace),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cache keyspace unavailable, using memory");
                None
            }
        };

        Self {
            collections: Mutex::new(HashMap::new()),
            keyspace,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            keyspace: None,
        }
    }

    /// Syncs persistent collections to disk. Failures are only logged.
    pub fn persist(&self) {
        if let Some(keyspace) = &self.keyspace
            && let Err(e) = keyspace.persist(PersistMode::SyncAll)
        {
            warn!(error = %e, "Failed to persist cache keyspace");
        }
    }
}

impl Store for KeyValueStore {
    fn get_collection(&self, name: &str, persist: bool) -> Arc<dyn KeyValueCollection> {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(collection) = collections.get(name) {
            return Arc::clone(collection);
        }

        let disk = persist
            .then_some(self.keyspace.as_ref())
            .flatten()
            .and_then(|ks| {
                ks.open_partition(name, PartitionCreateOptions::default())
                    .map_err(|e| debug!(collection = name, error = %e, "Failed to open partition"))
                    .ok()
            })
            .map(|partition| Arc::new(DiskCollection::new(partition)) as Arc<dyn KeyValueCollection>);

        let collection = disk.unwrap_or_else(|| Arc::new(MemoryCollection::new()));
        collections.insert(name.to_string(), Arc::clone(&collection));
        collection
    }
}
