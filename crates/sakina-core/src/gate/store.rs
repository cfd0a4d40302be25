//! Durable storage for [`GateSettings`].
//!
//! `load` never fails: a missing record yields defaults, an unreadable or
//! corrupt one yields defaults plus a warning. `save` replaces the record
//! atomically, so a concurrent `load` sees either the old or the new
//! document and never a partial one.
//!
//! Several controlling-app processes may share one data directory, each
//! with its own serializer. [`FileSettingsStore::update`] holds an exclusive
//! lock on a sibling `.lock` file across load, apply and save, so their
//! read-modify-write cycles never interleave.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::settings::GateSettings;
use crate::error::GateError;

const SETTINGS_FILE: &str = "gate_settings.json";

/// A pending change to the settings record.
pub type Mutation = Box<dyn FnOnce(GateSettings) -> GateSettings + Send>;

/// Storage contract for the canonical settings record.
///
/// Implementations normalize on both `load` and `save`.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> GateSettings;
    fn save(&self, settings: &GateSettings) -> Result<(), GateError>;

    /// Load, apply `mutation`, normalize and save as one step.
    ///
    /// Stores shared between processes override this to exclude other
    /// writers for the whole cycle.
    fn update(&self, mutation: Mutation) -> Result<GateSettings, GateError> {
        load_apply_save(self, mutation)
    }
}

fn load_apply_save<S: SettingsStore + ?Sized>(
    store: &S,
    mutation: Mutation,
) -> Result<GateSettings, GateError> {
    let next = mutation(store.load()).normalized();
    store.save(&next)?;
    Ok(next)
}

/// JSON document on disk, replaced by write-then-rename.
pub struct FileSettingsStore {
    path: PathBuf,
    defaults: GateSettings,
}

impl FileSettingsStore {
    /// Store at `<data_dir>/gate_settings.json`.
    pub fn open(data_dir: &Path, defaults: GateSettings) -> Self {
        Self::at_path(data_dir.join(SETTINGS_FILE), defaults)
    }

    pub fn at_path(path: PathBuf, defaults: GateSettings) -> Self {
        Self {
            path,
            defaults: defaults.normalized(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| SETTINGS_FILE.into());
        name.push(suffix);
        self.path.with_file_name(name)
    }

    /// Advisory lock file guarding read-modify-write cycles.
    pub fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Every writer gets its own temporary sibling, then renames it over the
    /// record.
    fn write_atomically(&self, bytes: &[u8]) -> std::io::Result<()> {
        let parent = self.parent_dir();
        std::fs::create_dir_all(parent)?;
        let mut file = NamedTempFile::new_in(parent)?;
        file.write_all(bytes)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn acquire_lock(&self) -> std::io::Result<std::fs::File> {
        std::fs::create_dir_all(self.parent_dir())?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        file.lock_exclusive()?;
        Ok(file)
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> GateSettings {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no gate settings stored, using defaults");
                return self.defaults.clone();
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "gate settings unreadable, using defaults"
                );
                return self.defaults.clone();
            }
        };

        match serde_json::from_str::<GateSettings>(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "gate settings corrupt, using defaults"
                );
                self.defaults.clone()
            }
        }
    }

    fn save(&self, settings: &GateSettings) -> Result<(), GateError> {
        let normalized = settings.clone().normalized();
        let bytes = serde_json::to_vec_pretty(&normalized)
            .map_err(|e| GateError::write_failed(&self.path, std::io::Error::other(e)))?;
        self.write_atomically(&bytes)
            .map_err(|e| GateError::write_failed(&self.path, e))?;
        debug!(path = %self.path.display(), "gate settings saved");
        Ok(())
    }

    fn update(&self, mutation: Mutation) -> Result<GateSettings, GateError> {
        let lock = self
            .acquire_lock()
            .map_err(|e| GateError::write_failed(self.lock_path(), e))?;
        let result = load_apply_save(self, mutation);
        if let Err(e) = FileExt::unlock(&lock) {
            debug!(path = %self.lock_path().display(), error = %e, "settings lock release failed");
        }
        result
    }
}

/// Process-local store, for tests and embedders without a filesystem.
#[derive(Default)]
pub struct MemorySettingsStore {
    record: Mutex<Option<GateSettings>>,
    defaults: GateSettings,
}

impl MemorySettingsStore {
    pub fn new(defaults: GateSettings) -> Self {
        Self {
            record: Mutex::new(None),
            defaults: defaults.normalized(),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> GateSettings {
        let record = self.record.lock().unwrap_or_else(|e| e.into_inner());
        record.clone().unwrap_or_else(|| self.defaults.clone())
    }

    fn save(&self, settings: &GateSettings) -> Result<(), GateError> {
        let mut record = self.record.lock().unwrap_or_else(|e| e.into_inner());
        *record = Some(settings.clone().normalized());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{record_completion, UnlockWindow};
    use chrono::Utc;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileSettingsStore {
        FileSettingsStore::open(dir.path(), GateSettings::default())
    }

    #[test]
    fn missing_record_loads_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(store_in(&dir).load(), GateSettings::default());
    }

    #[test]
    fn defaults_come_from_caller() {
        let dir = TempDir::new().unwrap();
        let store = FileSettingsStore::open(
            dir.path(),
            GateSettings::with_default_packages(["app.only"]),
        );
        let loaded = store.load();
        assert_eq!(loaded.blocked_packages.len(), 1);
        assert!(loaded.is_blocked("app.only"));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let settings = record_completion(
            GateSettings {
                enabled: true,
                unlock_window: UnlockWindow::Sixty,
                ..GateSettings::default()
            },
            Utc::now(),
        );
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);

        // No temporary file is left behind.
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(SETTINGS_FILE)]);
    }

    #[test]
    fn concurrent_saves_from_separate_stores_all_succeed() {
        let dir = TempDir::new().unwrap();
        let a = GateSettings::with_default_packages(["app.a"]);
        let b = GateSettings::with_default_packages(["app.b"]);

        for _ in 0..50 {
            let handles: Vec<_> = [a.clone(), b.clone()]
                .into_iter()
                .map(|settings| {
                    let store = store_in(&dir);
                    std::thread::spawn(move || store.save(&settings))
                })
                .collect();
            for handle in handles {
                handle.join().unwrap().unwrap();
            }

            let stored = store_in(&dir).load();
            assert!(stored == a || stored == b);
        }
    }

    #[test]
    fn update_applies_and_releases_lock() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let first = store
            .update(Box::new(|s: GateSettings| GateSettings { enabled: true, ..s }))
            .unwrap();
        assert!(first.enabled);

        let second = store
            .update(Box::new(|mut s: GateSettings| {
                s.blocked_packages.insert("app.z".to_string());
                s
            }))
            .unwrap();
        assert!(second.enabled);
        assert!(second.is_blocked("app.z"));
        assert_eq!(store.load(), second);
        assert!(store.lock_path().exists());
    }

    #[test]
    fn corrupt_record_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json").unwrap();
        assert_eq!(store.load(), GateSettings::default());
    }

    #[test]
    fn wrong_type_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"enabled":"yes"}"#).unwrap();
        assert_eq!(store.load(), GateSettings::default());
    }

    #[test]
    fn externally_edited_record_is_normalized() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"enabled":true,"unlockWindowMinutes":999,"blockedPackages":["x","x",""]}"#,
        )
        .unwrap();
        let loaded = store.load();
        assert!(loaded.enabled);
        assert_eq!(loaded.unlock_window, UnlockWindow::Thirty);
        assert_eq!(loaded.blocked_packages.len(), 1);
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        // A regular file where the parent directory should be.
        let store = FileSettingsStore::at_path(blocker.join("gate.json"), GateSettings::default());
        let result = store.save(&GateSettings::default());
        assert!(matches!(result, Err(GateError::StorageWrite { .. })));
    }

    #[test]
    fn memory_store_normalizes() {
        let store = MemorySettingsStore::new(GateSettings::default());
        let mut settings = GateSettings::default();
        settings.blocked_packages.insert(String::new());
        store.save(&settings).unwrap();
        assert!(!store.load().blocked_packages.contains(""));
    }
}
