//! Push side of the settings replication.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::snapshot::AgentSnapshot;
use crate::gate::GateSettings;
use crate::storage::{agent_dir, KvStore};

/// File name of the agent's key/value store inside the agent directory.
pub const AGENT_STORE_FILE: &str = "agent.db";

/// Delivers settings snapshots to the enforcement agent's storage.
///
/// `push` reports whether the snapshot reached the agent's storage layer.
/// It never errors: an unsupported host or a missing agent is `false`.
pub trait SyncBridge: Send + Sync {
    fn push(&self, settings: &GateSettings) -> bool;
}

/// Host without an enforcement agent.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedSyncBridge;

impl SyncBridge for UnsupportedSyncBridge {
    fn push(&self, _settings: &GateSettings) -> bool {
        info!("no enforcement agent on this platform, snapshot not pushed");
        false
    }
}

/// Writes snapshots into the agent's SQLite key/value store.
///
/// The store is opened on first push and reopened after a failed write.
pub struct KvSyncBridge {
    path: PathBuf,
    store: Mutex<Option<KvStore>>,
}

impl KvSyncBridge {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            store: Mutex::new(None),
        }
    }

    /// Bridge into `<agent_dir>/agent.db`.
    pub fn in_dir(agent_dir: &Path) -> Self {
        Self::new(agent_dir.join(AGENT_STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SyncBridge for KvSyncBridge {
    fn push(&self, settings: &GateSettings) -> bool {
        let mut guard = self.store.lock().unwrap_or_else(|e| e.into_inner());

        if guard.is_none() {
            match KvStore::open(&self.path) {
                Ok(store) => *guard = Some(store),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "agent store unavailable, snapshot not pushed"
                    );
                    return false;
                }
            }
        }

        let Some(store) = guard.as_mut() else {
            return false;
        };

        let snapshot = AgentSnapshot::from(settings);
        match snapshot.write(store) {
            Ok(()) => {
                debug!(
                    enabled = snapshot.enabled,
                    window = snapshot.unlock_window.minutes(),
                    blocked = snapshot.blocked_packages.len(),
                    "snapshot pushed to agent store"
                );
                true
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "snapshot push failed");
                *guard = None;
                false
            }
        }
    }
}

/// Bridge for the current host.
///
/// Desktop and mobile hosts get the key/value bridge into the agent
/// directory. Anything else, or a host whose agent directory cannot be
/// created, gets [`UnsupportedSyncBridge`].
pub fn host_bridge() -> Arc<dyn SyncBridge> {
    if !cfg!(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "windows",
        target_os = "android"
    )) {
        return Arc::new(UnsupportedSyncBridge);
    }

    match agent_dir() {
        Ok(dir) => Arc::new(KvSyncBridge::in_dir(&dir)),
        Err(e) => {
            warn!(error = %e, "agent directory unavailable, sync disabled");
            Arc::new(UnsupportedSyncBridge)
        }
    }
}
