use chrono::Utc;
use clap::Subcommand;
use sakina_core::Config;

use crate::common::{block_on, open_gate, settings_json, CmdResult};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Mark a prayer or meditation session complete and open the unlock window
    Complete,
}

pub fn run(action: SessionAction) -> CmdResult {
    let config = Config::load_or_default();

    block_on(async move {
        let gate = open_gate(&config)?;
        let settings = match action {
            SessionAction::Complete => gate.record_completion(Utc::now()).await?,
        };
        println!("{}", serde_json::to_string_pretty(&settings_json(&settings)?)?);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?
}
