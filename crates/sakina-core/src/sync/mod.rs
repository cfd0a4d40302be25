//! One-way replication of gate settings into the enforcement agent's store.
//!
//! The controlling app pushes a full snapshot after every successful
//! mutation. There is no acknowledgement channel back from the agent; the
//! two stores may diverge until the next push lands.

pub mod bridge;
pub mod snapshot;

pub use bridge::{host_bridge, KvSyncBridge, SyncBridge, UnsupportedSyncBridge};
pub use snapshot::AgentSnapshot;
