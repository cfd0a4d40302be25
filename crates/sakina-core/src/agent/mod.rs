//! Out-of-process enforcement of the distraction gate.

mod engine;
mod interstitial;
mod source;

pub use engine::{
    AgentPolicy, AgentState, Decision, DebounceRecord, EnforcementAgent, IgnoreReason, RunSummary,
    SnapshotSource,
};
pub use interstitial::{DeepLinkInterstitial, Interstitial};
pub use source::{ForegroundEvent, ForegroundSource, LineSource};
