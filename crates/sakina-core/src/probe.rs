//! Host capability probe.
//!
//! The agent needs two grants from the host: observing which app is in the
//! foreground, and reading which process owns it (usage access). Either can
//! be revoked at any time from the host's own settings, so every
//! [`CapabilityProbe::status`] call queries the host again.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::storage::ProbeConfig;

/// Grants the enforcement agent depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatus {
    pub foreground_observation_granted: bool,
    pub usage_access_granted: bool,
}

impl CapabilityStatus {
    pub fn all_granted(&self) -> bool {
        self.foreground_observation_granted && self.usage_access_granted
    }
}

pub trait CapabilityProbe {
    fn status(&self) -> CapabilityStatus;
    fn open_foreground_observation_settings(&self);
    fn open_usage_access_settings(&self);
}

/// Probe for the machine this process runs on.
#[derive(Debug, Clone, Default)]
pub struct HostProbe {
    config: ProbeConfig,
}

impl HostProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    fn open_settings(&self, what: &str, uri: &str) {
        if uri.is_empty() {
            warn!(capability = what, "host has no settings screen for this capability");
            return;
        }
        match open::that_detached(uri) {
            Ok(()) => info!(capability = what, %uri, "opened host settings"),
            Err(e) => warn!(capability = what, %uri, error = %e, "failed to open host settings"),
        }
    }
}

impl CapabilityProbe for HostProbe {
    #[cfg(target_os = "linux")]
    fn status(&self) -> CapabilityStatus {
        linux_status(
            std::env::var_os("DISPLAY").as_deref(),
            std::fs::read_dir("/proc").is_ok(),
        )
    }

    #[cfg(not(target_os = "linux"))]
    fn status(&self) -> CapabilityStatus {
        CapabilityStatus::default()
    }

    fn open_foreground_observation_settings(&self) {
        self.open_settings("foreground_observation", &self.config.foreground_settings_uri);
    }

    fn open_usage_access_settings(&self) {
        self.open_settings("usage_access", &self.config.usage_settings_uri);
    }
}

/// X11 lets any client ask for the active window; Wayland alone does not.
/// Mapping a window to its owning process needs `/proc`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn linux_status(display: Option<&std::ffi::OsStr>, proc_readable: bool) -> CapabilityStatus {
    CapabilityStatus {
        foreground_observation_granted: display.is_some_and(|d| !d.is_empty()),
        usage_access_granted: proc_readable,
    }
}
