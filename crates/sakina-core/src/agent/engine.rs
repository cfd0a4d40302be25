//! Enforcement agent state machine.
//!
//! The agent runs in its own process. It sees foreground-change events and
//! its own [`AgentSnapshot`], nothing else: no call ever goes back to the
//! controlling app while a decision is being made.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Evaluating(package) -> Idle
//! ```
//!
//! ## Decision order
//!
//! 1. Controlling app and OS chrome are exempt.
//! 2. Gate disabled, or package not blocked.
//! 3. Unlock window still open.
//! 4. Same package blocked less than one cooldown ago.
//! 5. Otherwise record the block and show the interstitial.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::interstitial::Interstitial;
use super::source::ForegroundSource;
use crate::error::AgentStoreError;
use crate::gate::remaining;
use crate::storage::{Config, KvStore};
use crate::sync::AgentSnapshot;

/// Where the agent reads its snapshot from.
pub trait SnapshotSource {
    fn load_snapshot(&self) -> Result<AgentSnapshot, AgentStoreError>;
}

impl SnapshotSource for KvStore {
    fn load_snapshot(&self) -> Result<AgentSnapshot, AgentStoreError> {
        AgentSnapshot::read(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum AgentState {
    Idle,
    Evaluating { package: String },
}

/// Last interception, kept in memory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceRecord {
    pub last_blocked_package: String,
    pub last_blocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Controlling app or OS chrome.
    Exempt,
    Disabled,
    NotBlocked,
    /// Session credit still valid.
    Unlocked { remaining_ms: i64 },
    Debounced,
    /// Snapshot could not be read; enforcement skipped for this event.
    SnapshotUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Blocked,
    Ignored(IgnoreReason),
}

impl Decision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Decision::Blocked)
    }
}

/// Static part of the agent's behaviour.
#[derive(Debug, Clone)]
pub struct AgentPolicy {
    pub controlling_package: String,
    pub system_packages: HashSet<String>,
    pub debounce_cooldown: Duration,
}

impl AgentPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            controlling_package: config.agent.controlling_package.clone(),
            system_packages: config.agent.system_packages.iter().cloned().collect(),
            debounce_cooldown: config.debounce_cooldown(),
        }
    }

    pub fn is_exempt(&self, package: &str) -> bool {
        package == self.controlling_package || self.system_packages.contains(package)
    }
}

impl Default for AgentPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Counters for one [`EnforcementAgent::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub events: u64,
    pub blocked: u64,
    pub ignored: u64,
}

pub struct EnforcementAgent<S, I> {
    policy: AgentPolicy,
    snapshots: S,
    interstitial: I,
    state: AgentState,
    debounce: Option<DebounceRecord>,
}

impl<S: SnapshotSource, I: Interstitial> EnforcementAgent<S, I> {
    pub fn new(policy: AgentPolicy, snapshots: S, interstitial: I) -> Self {
        Self {
            policy,
            snapshots,
            interstitial,
            state: AgentState::Idle,
            debounce: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn debounce(&self) -> Option<&DebounceRecord> {
        self.debounce.as_ref()
    }

    pub fn policy(&self) -> &AgentPolicy {
        &self.policy
    }

    pub fn interstitial(&self) -> &I {
        &self.interstitial
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Handle one foreground change to `package` observed at `now`.
    pub fn on_foreground_change(&mut self, package: &str, now: DateTime<Utc>) -> Decision {
        self.state = AgentState::Evaluating {
            package: package.to_string(),
        };
        let decision = self.evaluate(package, now);
        self.state = AgentState::Idle;

        match &decision {
            Decision::Blocked => info!(package, "blocked package brought to foreground"),
            Decision::Ignored(reason) => debug!(package, ?reason, "foreground change ignored"),
        }
        decision
    }

    fn evaluate(&mut self, package: &str, now: DateTime<Utc>) -> Decision {
        if self.policy.is_exempt(package) {
            return Decision::Ignored(IgnoreReason::Exempt);
        }

        let snapshot = match self.snapshots.load_snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(package, error = %e, "agent snapshot unreadable, skipping event");
                return Decision::Ignored(IgnoreReason::SnapshotUnavailable);
            }
        };

        if !snapshot.enabled {
            return Decision::Ignored(IgnoreReason::Disabled);
        }
        if !snapshot.is_blocked(package) {
            return Decision::Ignored(IgnoreReason::NotBlocked);
        }

        let left = remaining(&snapshot, now);
        if left > Duration::zero() {
            return Decision::Ignored(IgnoreReason::Unlocked {
                remaining_ms: left.num_milliseconds(),
            });
        }

        if let Some(record) = &self.debounce {
            if record.last_blocked_package == package
                && now - record.last_blocked_at < self.policy.debounce_cooldown
            {
                return Decision::Ignored(IgnoreReason::Debounced);
            }
        }

        self.debounce = Some(DebounceRecord {
            last_blocked_package: package.to_string(),
            last_blocked_at: now,
        });
        if let Err(e) = self.interstitial.show(package) {
            warn!(package, error = %e, "failed to show interstitial");
        }
        Decision::Blocked
    }

    /// Consume events until the source ends.
    pub fn run<F: ForegroundSource>(&mut self, mut source: F) -> RunSummary {
        let mut summary = RunSummary::default();
        while let Some(event) = source.next_event() {
            summary.events += 1;
            if self
                .on_foreground_change(&event.package, event.observed_at)
                .is_blocked()
            {
                summary.blocked += 1;
            } else {
                summary.ignored += 1;
            }
        }
        info!(
            events = summary.events,
            blocked = summary.blocked,
            "foreground event source ended"
        );
        summary
    }
}
