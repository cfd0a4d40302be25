mod config;
pub mod kv;

pub use config::{AgentConfig, Config, GateConfig, ProbeConfig};
pub use kv::KvStore;

use std::path::PathBuf;

/// Returns the controlling app's data directory.
///
/// Resolution order: `SAKINA_DATA_DIR` if set, otherwise
/// `~/.config/sakina[-dev]/` based on `SAKINA_ENV`. Set `SAKINA_ENV=dev` to
/// use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("SAKINA_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("SAKINA_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("sakina-dev")
            } else {
                base_dir.join("sakina")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Returns the enforcement agent's private directory, `<data_dir>/agent/`.
///
/// Only the sync bridge writes here and only the agent reads from here.
pub fn agent_dir() -> std::io::Result<PathBuf> {
    let dir = data_dir()?.join("agent");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
