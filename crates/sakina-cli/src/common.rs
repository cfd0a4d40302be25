//! Shared plumbing for commands that touch gate settings.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use sakina_core::gate::{remaining, FileSettingsStore, GateSettings, MutationSerializer};
use sakina_core::storage::data_dir;
use sakina_core::sync::host_bridge;
use sakina_core::Config;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Run `f` on a fresh single-threaded runtime.
pub fn block_on<F: Future>(f: F) -> Result<F::Output, std::io::Error> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(f))
}

/// Defaults for a fresh or reset gate, taken from configuration.
pub fn default_settings(config: &Config) -> GateSettings {
    GateSettings::with_default_packages(config.gate.default_blocked_packages.iter().cloned())
}

/// Serializer over the on-disk store and the host bridge.
///
/// Must be called inside a runtime.
pub fn open_gate(config: &Config) -> Result<MutationSerializer, std::io::Error> {
    let store = FileSettingsStore::open(&data_dir()?, default_settings(config));
    Ok(MutationSerializer::spawn(Arc::new(store), host_bridge()))
}

/// JSON view of settings plus the unlock state right now.
pub fn settings_json(settings: &GateSettings) -> Result<serde_json::Value, serde_json::Error> {
    let left = remaining(settings, Utc::now());
    Ok(serde_json::json!({
        "settings": serde_json::to_value(settings)?,
        "unlocked": left > chrono::Duration::zero(),
        "remainingSeconds": left.num_seconds(),
    }))
}
