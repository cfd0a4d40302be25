//! Canonical gate settings record.
//!
//! [`GateSettings`] is the in-memory form. On disk it is the flat camelCase
//! [`SettingsDocument`]; converting a document into settings always runs
//! [`GateSettings::normalized`], so nothing read back from storage can break
//! the invariants below.
//!
//! ## Invariants
//!
//! - `unlock_window` is one of 15/30/60 minutes; anything else read from
//!   storage becomes the 30 minute default.
//! - `blocked_packages` holds trimmed, non-empty, unique identifiers.
//! - `unlock_until` is only ever produced by
//!   [`record_completion`](super::unlock::record_completion).
//! - Timestamps carry millisecond precision, matching the stored form.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Packages blocked on a fresh install.
pub const DEFAULT_BLOCKED_PACKAGES: &[&str] = &[
    "com.instagram.android",
    "com.zhiliaoapp.musically",
    "com.twitter.android",
    "com.facebook.katana",
    "com.google.android.youtube",
    "com.snapchat.android",
    "com.reddit.frontpage",
];

/// Access granted per completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnlockWindow {
    Fifteen,
    #[default]
    Thirty,
    Sixty,
}

impl UnlockWindow {
    pub const ALL: [UnlockWindow; 3] = [
        UnlockWindow::Fifteen,
        UnlockWindow::Thirty,
        UnlockWindow::Sixty,
    ];

    pub fn minutes(self) -> u32 {
        match self {
            UnlockWindow::Fifteen => 15,
            UnlockWindow::Thirty => 30,
            UnlockWindow::Sixty => 60,
        }
    }

    /// Exact match only.
    pub fn from_minutes(minutes: i64) -> Option<Self> {
        match minutes {
            15 => Some(UnlockWindow::Fifteen),
            30 => Some(UnlockWindow::Thirty),
            60 => Some(UnlockWindow::Sixty),
            _ => None,
        }
    }

    /// Out-of-range values coerce to the default window.
    pub fn from_minutes_or_default(minutes: i64) -> Self {
        Self::from_minutes(minutes).unwrap_or_default()
    }

    pub fn duration(self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.minutes()))
    }
}

impl fmt::Display for UnlockWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} minutes", self.minutes())
    }
}

/// Gate configuration and unlock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SettingsDocument", from = "SettingsDocument")]
pub struct GateSettings {
    /// Whether gating is active at all.
    pub enabled: bool,
    pub unlock_window: UnlockWindow,
    pub blocked_packages: BTreeSet<String>,
    /// Blocked packages are accessible until this instant. `None` is locked.
    pub unlock_until: Option<DateTime<Utc>>,
    /// Informational; never consulted for the unlock decision.
    pub last_session_completed_at: Option<DateTime<Utc>>,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self::with_default_packages(DEFAULT_BLOCKED_PACKAGES.iter().copied())
    }
}

impl GateSettings {
    /// Defaults with a caller-supplied blocked set (from configuration).
    pub fn with_default_packages<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: false,
            unlock_window: UnlockWindow::default(),
            blocked_packages: packages.into_iter().map(Into::into).collect(),
            unlock_until: None,
            last_session_completed_at: None,
        }
        .normalized()
    }

    /// Enforce the record's invariants.
    pub fn normalized(mut self) -> Self {
        self.blocked_packages = normalize_packages(self.blocked_packages);
        self.unlock_until = self.unlock_until.map(truncate_millis);
        self.last_session_completed_at = self.last_session_completed_at.map(truncate_millis);
        self
    }

    pub fn is_blocked(&self, package: &str) -> bool {
        self.blocked_packages.contains(package)
    }
}

/// Trim, drop empties and deduplicate.
pub fn normalize_packages<I, S>(packages: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    packages
        .into_iter()
        .filter_map(|p| {
            let trimmed = p.as_ref().trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

pub(crate) fn truncate_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

pub(crate) fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Flat persisted projection of [`GateSettings`].
///
/// ```json
/// {"enabled": true, "unlockWindowMinutes": 30, "blockedPackages": ["app.x"],
///  "unlockUntilMs": 1767225600000, "lastPrayerCompletedAtMs": 1767223800000}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDocument {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_window_minutes")]
    pub unlock_window_minutes: i64,
    #[serde(default)]
    pub blocked_packages: Vec<String>,
    #[serde(default)]
    pub unlock_until_ms: Option<i64>,
    #[serde(default)]
    pub last_prayer_completed_at_ms: Option<i64>,
}

fn default_window_minutes() -> i64 {
    i64::from(UnlockWindow::default().minutes())
}

impl From<GateSettings> for SettingsDocument {
    fn from(settings: GateSettings) -> Self {
        Self {
            enabled: settings.enabled,
            unlock_window_minutes: i64::from(settings.unlock_window.minutes()),
            blocked_packages: settings.blocked_packages.into_iter().collect(),
            unlock_until_ms: settings.unlock_until.map(|t| t.timestamp_millis()),
            last_prayer_completed_at_ms: settings
                .last_session_completed_at
                .map(|t| t.timestamp_millis()),
        }
    }
}

impl From<SettingsDocument> for GateSettings {
    fn from(doc: SettingsDocument) -> Self {
        GateSettings {
            enabled: doc.enabled,
            unlock_window: UnlockWindow::from_minutes_or_default(doc.unlock_window_minutes),
            blocked_packages: normalize_packages(doc.blocked_packages),
            unlock_until: doc.unlock_until_ms.and_then(from_millis),
            last_session_completed_at: doc.last_prayer_completed_at_ms.and_then(from_millis),
        }
        .normalized()
    }
}
