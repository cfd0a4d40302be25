//! # Sakina Core Library
//!
//! This library provides the distraction gate behind the Sakina prayer and
//! meditation companion: selected apps stay blocked until the user completes
//! a session, then open for a fixed window.
//!
//! ## Architecture
//!
//! - **Gate**: canonical settings record, its store, and a single-writer
//!   serializer every mutation goes through
//! - **Sync**: one-way push of settings snapshots into the enforcement
//!   agent's own key/value store
//! - **Agent**: the out-of-process state machine that watches foreground
//!   changes and interrupts blocked apps
//! - **Probe**: reports the host grants the agent needs
//!
//! ## Key Components
//!
//! - [`MutationSerializer`]: serialized read-modify-write of gate settings
//! - [`GateSettings`]: the settings record
//! - [`EnforcementAgent`]: foreground-change decision logic
//! - [`Config`]: application configuration management

pub mod agent;
pub mod error;
pub mod gate;
pub mod probe;
pub mod storage;
pub mod sync;

pub use agent::{Decision, EnforcementAgent, IgnoreReason};
pub use error::{AgentStoreError, ConfigError, CoreError, GateError};
pub use gate::{GateSettings, MutationSerializer, SettingsStore, UnlockWindow};
pub use probe::{CapabilityProbe, CapabilityStatus, HostProbe};
pub use storage::Config;
pub use sync::{AgentSnapshot, SyncBridge};
