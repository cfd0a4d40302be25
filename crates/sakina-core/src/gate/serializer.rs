//! Single-writer access to the settings store.
//!
//! Every read-modify-write of [`GateSettings`] goes through
//! [`MutationSerializer::update`]. Requests travel over a channel to one
//! task that owns the store, and that task finishes a request completely
//! (load, apply, save, push) before it takes the next one. Concurrent
//! callers therefore see their updates applied in submission order, and no
//! update observes another half-applied.
//!
//! A failed save rejects only the request that caused it. The next request
//! loads whatever was last saved successfully.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::settings::{normalize_packages, GateSettings, UnlockWindow};
use super::store::{Mutation, SettingsStore};
use super::unlock::record_completion;
use crate::error::GateError;
use crate::sync::SyncBridge;

/// Requests handled by the serializer task.
enum Request {
    Update {
        mutation: Mutation,
        respond: oneshot::Sender<Result<GateSettings, GateError>>,
    },
    Read {
        respond: oneshot::Sender<Result<GateSettings, GateError>>,
    },
}

/// Handle to the serializer task. Cheap to clone; all clones feed the same
/// queue.
#[derive(Clone)]
pub struct MutationSerializer {
    tx: mpsc::UnboundedSender<Request>,
}

impl MutationSerializer {
    /// Start the serializer task on the current Tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(store: Arc<dyn SettingsStore>, bridge: Arc<dyn SyncBridge>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, store, bridge));
        Self { tx }
    }

    /// Apply `f` to the current settings and persist the result.
    ///
    /// Resolves to the saved settings, or to the storage error if saving
    /// failed. A failed push to the agent does not fail the update.
    pub async fn update<F>(&self, f: F) -> Result<GateSettings, GateError>
    where
        F: FnOnce(GateSettings) -> GateSettings + Send + 'static,
    {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(Request::Update {
                mutation: Box::new(f),
                respond,
            })
            .map_err(|_| GateError::SerializerClosed)?;
        rx.await.map_err(|_| GateError::SerializerClosed)?
    }

    /// Current settings, read in queue order.
    pub async fn current(&self) -> Result<GateSettings, GateError> {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(Request::Read { respond })
            .map_err(|_| GateError::SerializerClosed)?;
        rx.await.map_err(|_| GateError::SerializerClosed)?
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<GateSettings, GateError> {
        self.update(move |s| GateSettings { enabled, ..s }).await
    }

    pub async fn set_unlock_window(
        &self,
        unlock_window: UnlockWindow,
    ) -> Result<GateSettings, GateError> {
        self.update(move |s| GateSettings { unlock_window, ..s })
            .await
    }

    /// Replace the whole blocked set.
    pub async fn set_blocked_packages<I, S>(&self, packages: I) -> Result<GateSettings, GateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let blocked_packages = normalize_packages(packages);
        self.update(move |s| GateSettings {
            blocked_packages,
            ..s
        })
        .await
    }

    pub async fn block_package(&self, package: &str) -> Result<GateSettings, GateError> {
        let package = package.trim().to_string();
        self.update(move |mut s| {
            s.blocked_packages.insert(package);
            s
        })
        .await
    }

    pub async fn unblock_package(&self, package: &str) -> Result<GateSettings, GateError> {
        let package = package.trim().to_string();
        self.update(move |mut s| {
            s.blocked_packages.remove(&package);
            s
        })
        .await
    }

    /// Credit a completed session: the unlock window restarts at `now`.
    pub async fn record_completion(&self, now: DateTime<Utc>) -> Result<GateSettings, GateError> {
        self.update(move |s| record_completion(s, now)).await
    }

    /// Replace everything with `defaults`.
    pub async fn reset(&self, defaults: GateSettings) -> Result<GateSettings, GateError> {
        self.update(move |_| defaults).await
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Request>,
    store: Arc<dyn SettingsStore>,
    bridge: Arc<dyn SyncBridge>,
) {
    while let Some(request) = rx.recv().await {
        match request {
            Request::Update { mutation, respond } => {
                let result = apply(&store, &bridge, mutation).await;
                // The caller may have stopped waiting; the update still stands.
                let _ = respond.send(result);
            }
            Request::Read { respond } => {
                let store = Arc::clone(&store);
                let result = tokio::task::spawn_blocking(move || store.load())
                    .await
                    .map_err(GateError::from);
                let _ = respond.send(result);
            }
        }
    }
    debug!("gate settings serializer stopped");
}

async fn apply(
    store: &Arc<dyn SettingsStore>,
    bridge: &Arc<dyn SyncBridge>,
    mutation: Mutation,
) -> Result<GateSettings, GateError> {
    let writer = Arc::clone(store);
    let saved = tokio::task::spawn_blocking(move || writer.update(mutation)).await?;

    let saved = match saved {
        Ok(saved) => saved,
        Err(e) => {
            warn!(error = %e, "gate settings update rejected");
            return Err(e);
        }
    };

    info!(
        enabled = saved.enabled,
        window = saved.unlock_window.minutes(),
        blocked = saved.blocked_packages.len(),
        unlocked_until = ?saved.unlock_until,
        "gate settings updated"
    );

    // Awaited only so pushes reach the agent in the same order as saves;
    // the outcome never affects the caller.
    let pusher = Arc::clone(bridge);
    let snapshot = saved.clone();
    match tokio::task::spawn_blocking(move || pusher.push(&snapshot)).await {
        Ok(true) => {}
        Ok(false) => debug!("agent snapshot not updated; stores diverge until next push"),
        Err(e) => warn!(error = %e, "agent snapshot push task failed"),
    }

    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::MemorySettingsStore;
    use crate::sync::UnsupportedSyncBridge;

    fn serializer() -> MutationSerializer {
        MutationSerializer::spawn(
            Arc::new(MemorySettingsStore::new(GateSettings::default())),
            Arc::new(UnsupportedSyncBridge),
        )
    }

    #[tokio::test]
    async fn update_returns_saved_settings() {
        let gate = serializer();
        let saved = gate.set_enabled(true).await.unwrap();
        assert!(saved.enabled);
        assert!(gate.current().await.unwrap().enabled);
    }

    #[tokio::test]
    async fn block_and_unblock() {
        let gate = serializer();
        gate.set_blocked_packages(["app.a"]).await.unwrap();
        gate.block_package("  app.b ").await.unwrap();
        let settings = gate.unblock_package("app.a").await.unwrap();
        assert_eq!(
            settings.blocked_packages.into_iter().collect::<Vec<_>>(),
            vec!["app.b".to_string()]
        );
    }

    #[tokio::test]
    async fn block_ignores_blank_package() {
        let gate = serializer();
        gate.set_blocked_packages(Vec::<String>::new()).await.unwrap();
        let settings = gate.block_package("   ").await.unwrap();
        assert!(settings.blocked_packages.is_empty());
    }

    #[tokio::test]
    async fn reset_restores_defaults() {
        let gate = serializer();
        gate.set_enabled(true).await.unwrap();
        gate.record_completion(Utc::now()).await.unwrap();
        let settings = gate.reset(GateSettings::default()).await.unwrap();
        assert_eq!(settings, GateSettings::default());
    }

    #[tokio::test]
    async fn record_completion_uses_stored_window() {
        let gate = serializer();
        gate.set_unlock_window(UnlockWindow::Sixty).await.unwrap();
        let now = Utc::now();
        let settings = gate.record_completion(now).await.unwrap();
        let until = settings.unlock_until.unwrap();
        assert_eq!(
            until - settings.last_session_completed_at.unwrap(),
            chrono::Duration::minutes(60)
        );
    }
}
