//! Sakina enforcement agent.
//!
//! Runs independently of the controlling app. Foreground-change events
//! arrive one package id per line (stdin by default) from whatever host
//! observer is installed; each is checked against the agent's own snapshot
//! and blocked packages get the interstitial.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;
use sakina_core::agent::{
    AgentPolicy, DeepLinkInterstitial, EnforcementAgent, Interstitial, LineSource,
};
use sakina_core::storage::agent_dir;
use sakina_core::sync::bridge::AGENT_STORE_FILE;
use sakina_core::{CapabilityProbe, Config, HostProbe};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod store;

use store::LazySnapshotStore;

#[derive(Parser)]
#[command(name = "sakina-agent", version, about = "Sakina enforcement agent")]
struct Cli {
    /// Read foreground events from this file instead of stdin
    #[arg(long)]
    events: Option<PathBuf>,
    /// Log interceptions without opening the interstitial
    #[arg(long)]
    dry_run: bool,
    /// Print a JSON summary when the event stream ends
    #[arg(long)]
    summary: bool,
}

/// Logs instead of interrupting.
struct LogOnly;

impl Interstitial for LogOnly {
    fn show(&self, package: &str) -> std::io::Result<()> {
        info!(package, "dry run: interstitial suppressed");
        Ok(())
    }
}

enum Surface {
    DeepLink(DeepLinkInterstitial),
    LogOnly(LogOnly),
}

impl Interstitial for Surface {
    fn show(&self, package: &str) -> std::io::Result<()> {
        match self {
            Surface::DeepLink(link) => link.show(package),
            Surface::LogOnly(log) => log.show(package),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SAKINA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();

    let capabilities = HostProbe::new(config.probe.clone()).status();
    if !capabilities.all_granted() {
        warn!(?capabilities, "host capabilities missing; events may never arrive");
    }

    let snapshots = LazySnapshotStore::new(agent_dir()?.join(AGENT_STORE_FILE));
    let surface = if cli.dry_run {
        Surface::LogOnly(LogOnly)
    } else {
        Surface::DeepLink(DeepLinkInterstitial::new(config.agent.interstitial_uri.clone()))
    };
    let mut agent = EnforcementAgent::new(AgentPolicy::from_config(&config), snapshots, surface);

    info!("enforcement agent started");
    let summary = match cli.events {
        Some(path) => agent.run(LineSource::new(BufReader::new(File::open(path)?))),
        None => agent.run(LineSource::new(std::io::stdin().lock())),
    };

    if cli.summary {
        println!("{}", serde_json::to_string(&summary)?);
    }
    Ok(())
}

fn main() {
    init_tracing();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
