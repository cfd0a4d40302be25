//! Unlock window calculation.
//!
//! The controlling app and the enforcement agent both answer "may blocked
//! packages run right now?" with these functions, each against its own copy
//! of the settings. Neither side asks the other.

use chrono::{DateTime, Duration, Utc};

use super::settings::{truncate_millis, GateSettings};

/// Anything carrying an unlock deadline.
pub trait UnlockState {
    fn unlock_until(&self) -> Option<DateTime<Utc>>;
}

impl UnlockState for GateSettings {
    fn unlock_until(&self) -> Option<DateTime<Utc>> {
        self.unlock_until
    }
}

/// Time left in the unlock window. Zero when locked or expired.
pub fn remaining<S: UnlockState + ?Sized>(state: &S, now: DateTime<Utc>) -> Duration {
    match state.unlock_until() {
        Some(until) if until > now => until - now,
        _ => Duration::zero(),
    }
}

pub fn is_unlocked<S: UnlockState + ?Sized>(state: &S, now: DateTime<Utc>) -> bool {
    remaining(state, now) > Duration::zero()
}

/// Credit a completed session at `now`.
///
/// The window restarts at `now`; it never stacks on top of time left from an
/// earlier completion.
pub fn record_completion(settings: GateSettings, now: DateTime<Utc>) -> GateSettings {
    let now = truncate_millis(now);
    GateSettings {
        unlock_until: Some(now + settings.unlock_window.duration()),
        last_session_completed_at: Some(now),
        ..settings
    }
}
