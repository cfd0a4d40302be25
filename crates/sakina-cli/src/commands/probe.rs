use clap::Subcommand;
use sakina_core::{CapabilityProbe, Config, HostProbe};

use crate::common::CmdResult;

#[derive(Subcommand)]
pub enum ProbeAction {
    /// Print which capabilities the host has granted, as JSON
    Status,
    /// Open the host screen that grants foreground observation
    OpenForeground,
    /// Open the host screen that grants usage access
    OpenUsage,
}

pub fn run(action: ProbeAction) -> CmdResult {
    let config = Config::load_or_default();
    let probe = HostProbe::new(config.probe);

    match action {
        ProbeAction::Status => {
            let status = probe.status();
            println!("{}", serde_json::to_string_pretty(&status)?);
            if !status.all_granted() {
                eprintln!(
                    "enforcement agent is missing host capabilities; \
                     gating has no effect until granted"
                );
            }
        }
        ProbeAction::OpenForeground => probe.open_foreground_observation_settings(),
        ProbeAction::OpenUsage => probe.open_usage_access_settings(),
    }
    Ok(())
}
