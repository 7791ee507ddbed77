//! Agent entry point: wire the store, providers and supervisor together.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::info;

use tidal_core::AgentConfig;
use tidal_policy::{PolicyStore, StorePolicySource};

use crate::loader::load_plugins;
use crate::providers::Providers;
use crate::supervisor::Supervisor;

/// Run the control loop until `shutdown` fires.
///
/// Only startup failures are returned: invalid configuration, opening the
/// policy store and the plugin load pass. Everything after that is logged and survived.
pub async fn run(config: AgentConfig, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    config.validate().context("invalid agent configuration")?;
    let poll_interval = config.poll_interval().context("invalid policy_storage.poll_interval")?;
    let launch_timeout = config.launch_timeout().context("invalid plugins.launch_timeout")?;
    let kill_timeout = config.kill_timeout().context("invalid plugins.kill_timeout")?;
    let scan_interval = config.scan_interval();

    let store_path = &config.policy_storage.path;
    if let Some(parent) = store_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = PolicyStore::open(store_path)
        .with_context(|| format!("failed to open policy store {}", store_path.display()))?;
    info!(path = ?store_path, "policy store opened");

    let providers = Arc::new(Providers::new(launch_timeout, kill_timeout));
    if let Err(e) = load_plugins(&providers, &config).await {
        providers.kill().await;
        return Err(e);
    }

    let source = Arc::new(StorePolicySource::new(store, poll_interval));
    let supervisor = Supervisor::new(source, providers, scan_interval);

    info!(?scan_interval, plugin_dir = ?config.plugin_dir, "tidal agent running");
    supervisor.run(shutdown).await;
    info!("tidal agent stopped");
    Ok(())
}
