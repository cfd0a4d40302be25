//! End-to-end: settings mutated in the controlling process reach the agent
//! through the key/value bridge, and the agent decides on its own copy.

use std::cell::RefCell;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sakina_core::agent::{AgentPolicy, Decision, EnforcementAgent, IgnoreReason, Interstitial};
use sakina_core::gate::{FileSettingsStore, GateSettings, MutationSerializer, UnlockWindow};
use sakina_core::storage::KvStore;
use sakina_core::sync::{AgentSnapshot, KvSyncBridge};
use tempfile::TempDir;

#[derive(Default)]
struct CountingInterstitial {
    shown: RefCell<Vec<String>>,
}

impl Interstitial for CountingInterstitial {
    fn show(&self, package: &str) -> std::io::Result<()> {
        self.shown.borrow_mut().push(package.to_string());
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    gate: MutationSerializer,
    agent_db: std::path::PathBuf,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = FileSettingsStore::open(dir.path(), GateSettings::default());
        let bridge = KvSyncBridge::in_dir(&dir.path().join("agent"));
        let agent_db = bridge.path().to_path_buf();
        let gate = MutationSerializer::spawn(Arc::new(store), Arc::new(bridge));
        Self {
            _dir: dir,
            gate,
            agent_db,
        }
    }

    /// The agent opens its own handle, as a separate process would.
    fn agent(&self) -> EnforcementAgent<KvStore, CountingInterstitial> {
        EnforcementAgent::new(
            AgentPolicy::default(),
            KvStore::open(&self.agent_db).unwrap(),
            CountingInterstitial::default(),
        )
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 4, 30, 0).unwrap()
}

#[tokio::test]
async fn decision_table() {
    let harness = Harness::new();
    harness.gate.set_blocked_packages(["app.x"]).await.unwrap();
    harness.gate.set_enabled(true).await.unwrap();

    let mut agent = harness.agent();

    // Locked: first event blocks, a duplicate within the cooldown does not.
    assert_eq!(agent.on_foreground_change("app.x", t0()), Decision::Blocked);
    assert_eq!(
        agent.on_foreground_change("app.x", t0() + Duration::milliseconds(300)),
        Decision::Ignored(IgnoreReason::Debounced)
    );
    assert_eq!(agent.interstitial().shown.borrow().len(), 1);

    // A completed session at t unlocks for the 30 minute window.
    let t = t0() + Duration::minutes(5);
    harness.gate.record_completion(t).await.unwrap();

    assert!(matches!(
        agent.on_foreground_change("app.x", t + Duration::minutes(1)),
        Decision::Ignored(IgnoreReason::Unlocked { .. })
    ));
    assert_eq!(
        agent.on_foreground_change("app.x", t + Duration::minutes(31)),
        Decision::Blocked
    );
    assert_eq!(agent.interstitial().shown.borrow().len(), 2);
}

#[tokio::test]
async fn disabled_gate_never_blocks() {
    let harness = Harness::new();
    harness.gate.set_blocked_packages(["app.x"]).await.unwrap();
    harness.gate.set_enabled(false).await.unwrap();

    let mut agent = harness.agent();
    for minutes in [0, 1, 31, 120] {
        assert_eq!(
            agent.on_foreground_change("app.x", t0() + Duration::minutes(minutes)),
            Decision::Ignored(IgnoreReason::Disabled)
        );
    }
    assert!(agent.interstitial().shown.borrow().is_empty());
}

#[tokio::test]
async fn snapshot_mirrors_latest_saved_settings() {
    let harness = Harness::new();
    harness.gate.set_enabled(true).await.unwrap();
    harness
        .gate
        .set_unlock_window(UnlockWindow::Fifteen)
        .await
        .unwrap();
    let saved = harness.gate.record_completion(t0()).await.unwrap();

    let store = KvStore::open(&harness.agent_db).unwrap();
    let snapshot = AgentSnapshot::read(&store).unwrap();
    assert_eq!(snapshot, AgentSnapshot::from(&saved));
    assert_eq!(snapshot.unlock_until, Some(t0() + Duration::minutes(15)));
}

#[tokio::test]
async fn agent_without_any_push_stays_out_of_the_way() {
    let dir = TempDir::new().unwrap();
    let mut agent = EnforcementAgent::new(
        AgentPolicy::default(),
        KvStore::open(&dir.path().join("agent.db")).unwrap(),
        CountingInterstitial::default(),
    );
    assert_eq!(
        agent.on_foreground_change("com.instagram.android", t0()),
        Decision::Ignored(IgnoreReason::Disabled)
    );
}
