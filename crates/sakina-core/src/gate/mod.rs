//! Distraction gate: settings model, storage and serialized mutation.
//!
//! ## Flow
//!
//! UI or session completion → [`MutationSerializer`] → [`SettingsStore`] →
//! [`SyncBridge`](crate::sync::SyncBridge) → agent snapshot.
//!
//! The unlock decision in [`unlock`] is shared with the enforcement agent,
//! which evaluates it against its own snapshot.

mod serializer;
mod settings;
mod store;
pub mod unlock;

pub use serializer::MutationSerializer;
pub use settings::{
    normalize_packages, GateSettings, SettingsDocument, UnlockWindow, DEFAULT_BLOCKED_PACKAGES,
};
pub use store::{FileSettingsStore, MemorySettingsStore, Mutation, SettingsStore};
pub use unlock::{is_unlocked, record_completion, remaining, UnlockState};
