//! Agent mode — load configuration and run the control loop until Ctrl-C.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info};

use tidal_core::AgentConfig;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub plugin_dir: Option<PathBuf>,
    pub scan_interval: Option<String>,
    pub policy_db: Option<PathBuf>,
}

/// Read the config file (or defaults) and apply command-line overrides.
pub fn load_config(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<AgentConfig> {
    let mut config = match path {
        Some(path) => AgentConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AgentConfig::default(),
    };

    if let Some(dir) = overrides.plugin_dir {
        config.plugin_dir = dir;
    }
    if let Some(interval) = overrides.scan_interval {
        config.scan_interval = interval;
    }
    if let Some(db) = overrides.policy_db {
        config.policy_storage.path = db;
    }
    Ok(config)
}

pub async fn run_agent(config_path: Option<&Path>, overrides: Overrides) -> anyhow::Result<()> {
    let config = load_config(config_path, overrides)?;
    info!(config = ?config_path, "tidal agent starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!(error = %e, "failed to listen for Ctrl-C, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });

    tidal_agent::run(config, shutdown_rx).await
}
