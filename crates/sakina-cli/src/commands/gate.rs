use clap::Subcommand;
use sakina_core::gate::UnlockWindow;
use sakina_core::Config;

use crate::common::{block_on, default_settings, open_gate, settings_json, CmdResult};

#[derive(Subcommand)]
pub enum GateAction {
    /// Print gate settings and unlock state as JSON
    Status,
    /// Turn gating on
    Enable,
    /// Turn gating off
    Disable,
    /// Set how long each completed session unlocks blocked apps
    Window {
        /// Minutes: 15, 30 or 60
        minutes: i64,
    },
    /// Add a package to the blocked set
    Block {
        /// Package identifier (e.g. "com.instagram.android")
        package: String,
    },
    /// Remove a package from the blocked set
    Unblock {
        /// Package identifier
        package: String,
    },
    /// Replace the blocked set
    SetBlocked {
        /// Package identifiers
        packages: Vec<String>,
    },
    /// Reset gate settings to defaults
    Reset,
    /// Push current settings to the enforcement agent again
    Sync,
}

pub fn run(action: GateAction) -> CmdResult {
    let config = Config::load_or_default();

    if let GateAction::Window { minutes } = &action {
        if UnlockWindow::from_minutes(*minutes).is_none() {
            return Err(
                format!("unlock window must be 15, 30 or 60 minutes, got {minutes}").into(),
            );
        }
    }

    block_on(async move {
        let gate = open_gate(&config)?;
        let settings = match action {
            GateAction::Status => gate.current().await?,
            GateAction::Enable => gate.set_enabled(true).await?,
            GateAction::Disable => gate.set_enabled(false).await?,
            GateAction::Window { minutes } => {
                gate.set_unlock_window(UnlockWindow::from_minutes_or_default(minutes))
                    .await?
            }
            GateAction::Block { package } => {
                if package.trim().is_empty() {
                    return Err("package identifier must not be empty".into());
                }
                gate.block_package(&package).await?
            }
            GateAction::Unblock { package } => gate.unblock_package(&package).await?,
            GateAction::SetBlocked { packages } => gate.set_blocked_packages(packages).await?,
            GateAction::Reset => gate.reset(default_settings(&config)).await?,
            GateAction::Sync => gate.update(|s| s).await?,
        };
        println!("{}", serde_json::to_string_pretty(&settings_json(&settings)?)?);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?
}
