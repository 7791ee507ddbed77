//! One-time plugin load pass at startup.
//!
//! Every configured provider (plus the built-in local-cluster metric source
//! and target) is launched from the plugin directory, dispensed once and
//! handed its static config. Any failure here is fatal to the agent.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use tidal_core::{AgentConfig, ProviderRegistration};
use tidal_plugin::{Capability, LaunchConfig, PluginManager};

use crate::providers::Providers;

/// Launch and configure every provider named in `config`.
pub async fn load_plugins(providers: &Providers, config: &AgentConfig) -> anyhow::Result<()> {
    let plugin_dir = config.plugin_dir.as_path();

    for reg in config.metric_source_registrations() {
        let source = launch(&providers.metric_sources, plugin_dir, &reg).await?;
        source
            .set_config(&reg.config)
            .await
            .with_context(|| format!("failed to configure apm plugin {:?}", reg.name))?;
    }

    for reg in config.target_registrations() {
        let target = launch(&providers.targets, plugin_dir, &reg).await?;
        target
            .set_config(&reg.config)
            .await
            .with_context(|| format!("failed to configure target plugin {:?}", reg.name))?;
    }

    for reg in config.strategy_registrations() {
        let strategy = launch(&providers.strategies, plugin_dir, &reg).await?;
        strategy
            .set_config(&reg.config)
            .await
            .with_context(|| format!("failed to configure strategy plugin {:?}", reg.name))?;
    }

    info!(
        apm = ?providers.metric_sources.names().await,
        target = ?providers.targets.names().await,
        strategy = ?providers.strategies.names().await,
        "plugins loaded"
    );
    Ok(())
}

/// Register `reg` with `manager` and dispense it.
async fn launch<C: Capability + ?Sized>(
    manager: &PluginManager<C>,
    plugin_dir: &Path,
    reg: &ProviderRegistration,
) -> anyhow::Result<Arc<C>> {
    let launch = LaunchConfig::new(plugin_dir.join(&reg.driver));
    manager
        .register_plugin(&reg.name, &launch)
        .await
        .with_context(|| format!("failed to load plugin {:?} (driver {:?})", reg.name, reg.driver))?;
    let handle = manager.dispense(&reg.name).await?;
    Ok(handle)
}
