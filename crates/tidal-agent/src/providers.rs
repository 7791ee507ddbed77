//! The three provider managers, shared by every policy monitor.

use std::time::Duration;

use tidal_plugin::{MetricSourceManager, PluginManager, StrategyManager, TargetManager};
use tracing::info;

pub struct Providers {
    pub metric_sources: MetricSourceManager,
    pub targets: TargetManager,
    pub strategies: StrategyManager,
}

impl Providers {
    pub fn new(launch_timeout: Duration, kill_timeout: Duration) -> Self {
        Self {
            metric_sources: PluginManager::new(launch_timeout, kill_timeout),
            targets: PluginManager::new(launch_timeout, kill_timeout),
            strategies: PluginManager::new(launch_timeout, kill_timeout),
        }
    }

    /// Stop every provider process in all three managers.
    pub async fn kill(&self) {
        tokio::join!(
            self.metric_sources.kill(),
            self.targets.kill(),
            self.strategies.kill(),
        );
        info!("all plugins stopped");
    }
}
