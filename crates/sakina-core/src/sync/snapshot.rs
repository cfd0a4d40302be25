//! The enforcement agent's copy of gate settings.
//!
//! Stored as individual entries in the agent's key/value store. The layout
//! is flat and versionless: every key is optional and a missing or
//! unparsable entry falls back to the same default the settings record
//! uses, so the agent never needs a migration.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::AgentStoreError;
use crate::gate::{normalize_packages, GateSettings, UnlockState, UnlockWindow};
use crate::storage::kv::KvEntry;
use crate::storage::KvStore;

pub const KEY_ENABLED: &str = "gate.enabled";
pub const KEY_UNLOCK_WINDOW_MINUTES: &str = "gate.unlock_window_minutes";
pub const KEY_UNLOCK_UNTIL_MS: &str = "gate.unlock_until_ms";
pub const KEY_BLOCKED_PACKAGES: &str = "gate.blocked_packages";

/// Fields of [`GateSettings`] the agent needs to decide.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSnapshot {
    pub enabled: bool,
    #[serde(serialize_with = "serialize_window")]
    pub unlock_window: UnlockWindow,
    pub unlock_until: Option<DateTime<Utc>>,
    pub blocked_packages: BTreeSet<String>,
}

fn serialize_window<S: serde::Serializer>(window: &UnlockWindow, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u32(window.minutes())
}

impl From<&GateSettings> for AgentSnapshot {
    fn from(settings: &GateSettings) -> Self {
        Self {
            enabled: settings.enabled,
            unlock_window: settings.unlock_window,
            unlock_until: settings.unlock_until,
            blocked_packages: settings.blocked_packages.clone(),
        }
    }
}

impl UnlockState for AgentSnapshot {
    fn unlock_until(&self) -> Option<DateTime<Utc>> {
        self.unlock_until
    }
}

impl AgentSnapshot {
    pub fn is_blocked(&self, package: &str) -> bool {
        self.blocked_packages.contains(package)
    }

    /// Key/value entries replacing the stored snapshot. A locked gate removes
    /// the deadline key rather than writing a sentinel.
    pub fn to_entries(&self) -> Vec<KvEntry<'static>> {
        let packages: Vec<&String> = self.blocked_packages.iter().collect();
        vec![
            (KEY_ENABLED, Some(self.enabled.to_string())),
            (
                KEY_UNLOCK_WINDOW_MINUTES,
                Some(self.unlock_window.minutes().to_string()),
            ),
            (
                KEY_UNLOCK_UNTIL_MS,
                self.unlock_until.map(|t| t.timestamp_millis().to_string()),
            ),
            (
                KEY_BLOCKED_PACKAGES,
                Some(serde_json::to_string(&packages).unwrap_or_else(|_| "[]".to_string())),
            ),
        ]
    }

    /// Replace the stored snapshot in one transaction.
    pub fn write(&self, store: &mut KvStore) -> Result<(), AgentStoreError> {
        store.write_batch(&self.to_entries())
    }

    /// Read the stored snapshot, defaulting each missing or malformed field.
    ///
    /// All entries come from one statement, so a push landing mid-read can
    /// never mix fields of two snapshots.
    ///
    /// # Errors
    /// Only storage failures are errors; content problems are not.
    pub fn read(store: &KvStore) -> Result<Self, AgentStoreError> {
        let mut entries = store.read_batch(&[
            KEY_ENABLED,
            KEY_UNLOCK_WINDOW_MINUTES,
            KEY_UNLOCK_UNTIL_MS,
            KEY_BLOCKED_PACKAGES,
        ])?;

        let enabled = match entries.remove(KEY_ENABLED) {
            Some(raw) => raw.parse::<bool>().unwrap_or_else(|_| {
                warn!(key = KEY_ENABLED, value = %raw, "malformed snapshot entry");
                false
            }),
            None => false,
        };

        let unlock_window = match entries.remove(KEY_UNLOCK_WINDOW_MINUTES) {
            Some(raw) => match raw.parse::<i64>() {
                Ok(minutes) => UnlockWindow::from_minutes_or_default(minutes),
                Err(_) => {
                    warn!(
                        key = KEY_UNLOCK_WINDOW_MINUTES,
                        value = %raw,
                        "malformed snapshot entry"
                    );
                    UnlockWindow::default()
                }
            },
            None => UnlockWindow::default(),
        };

        let unlock_until = match entries.remove(KEY_UNLOCK_UNTIL_MS) {
            Some(raw) => {
                let parsed = raw.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis);
                if parsed.is_none() {
                    warn!(key = KEY_UNLOCK_UNTIL_MS, value = %raw, "malformed snapshot entry");
                }
                parsed
            }
            None => None,
        };

        let blocked_packages = match entries.remove(KEY_BLOCKED_PACKAGES) {
            Some(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(list) => normalize_packages(list),
                Err(e) => {
                    warn!(key = KEY_BLOCKED_PACKAGES, error = %e, "malformed snapshot entry");
                    BTreeSet::new()
                }
            },
            None => BTreeSet::new(),
        };

        Ok(Self {
            enabled,
            unlock_window,
            unlock_until,
            blocked_packages,
        })
    }
}
