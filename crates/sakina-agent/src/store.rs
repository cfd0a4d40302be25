//! Agent-side handle on the snapshot store.

use std::cell::RefCell;
use std::path::PathBuf;

use sakina_core::agent::SnapshotSource;
use sakina_core::storage::KvStore;
use sakina_core::{AgentSnapshot, AgentStoreError};

/// Opens the agent store on first use and again after any failure, so an
/// agent started before the first push picks the store up once it exists.
pub struct LazySnapshotStore {
    path: PathBuf,
    store: RefCell<Option<KvStore>>,
}

impl LazySnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            store: RefCell::new(None),
        }
    }
}

impl SnapshotSource for LazySnapshotStore {
    fn load_snapshot(&self) -> Result<AgentSnapshot, AgentStoreError> {
        let mut slot = self.store.borrow_mut();
        if slot.is_none() {
            *slot = Some(KvStore::open(&self.path)?);
        }
        let result = match slot.as_ref() {
            Some(store) => AgentSnapshot::read(store),
            None => Ok(AgentSnapshot::default()),
        };
        if result.is_err() {
            *slot = None;
        }
        result
    }
}
