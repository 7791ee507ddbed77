//! Agent configuration file parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};
use crate::types::{ConfigMap, ProviderRegistration};

/// Name of the built-in metric source and target that reach the local cluster.
pub const LOCAL_CLUSTER: &str = "local-cluster";

/// Driver executable for the built-in metric source.
pub const LOCAL_CLUSTER_APM_DRIVER: &str = "cluster-apm";

/// Driver executable for the built-in target.
pub const LOCAL_CLUSTER_TARGET_DRIVER: &str = "cluster-target";

const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Directory holding provider executables.
    pub plugin_dir: PathBuf,
    /// Default policy evaluation interval.
    pub scan_interval: String,
    pub cluster: ClusterConfig,
    pub policy_storage: PolicyStorageConfig,
    pub plugins: PluginsConfig,
    #[serde(rename = "apm")]
    pub apms: Vec<ProviderRegistration>,
    #[serde(rename = "target")]
    pub targets: Vec<ProviderRegistration>,
    #[serde(rename = "strategy")]
    pub strategies: Vec<ProviderRegistration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub address: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyStorageConfig {
    pub path: PathBuf,
    pub poll_interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Deadline for a provider to complete its handshake.
    pub launch_timeout: String,
    /// Deadline for a provider to exit after being asked to stop.
    pub kill_timeout: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            plugin_dir: PathBuf::from("/opt/tidal/plugins"),
            scan_interval: "5s".to_string(),
            cluster: ClusterConfig::default(),
            policy_storage: PolicyStorageConfig::default(),
            plugins: PluginsConfig::default(),
            apms: Vec::new(),
            targets: Vec::new(),
            strategies: Vec::new(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8443".to_string(),
            region: "global".to_string(),
        }
    }
}

impl Default for PolicyStorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/tidal/policies.redb"),
            poll_interval: "10s".to_string(),
        }
    }
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            launch_timeout: "10s".to_string(),
            kill_timeout: "5s".to_string(),
        }
    }
}

impl AgentConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: AgentConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every duration that must parse. `scan_interval` is exempt: a
    /// bad value falls back to the default at use time. A zero
    /// `kill_timeout` is allowed and means providers are killed outright.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval()?.is_zero() {
            return Err(ConfigError::Invalid(
                "policy_storage.poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.launch_timeout()?.is_zero() {
            return Err(ConfigError::Invalid(
                "plugins.launch_timeout must be greater than zero".to_string(),
            ));
        }
        self.kill_timeout()?;
        for reg in self.apms.iter().chain(&self.targets).chain(&self.strategies) {
            if reg.name.is_empty() || reg.driver.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "provider registration needs both name and driver: {reg:?}"
                )));
            }
        }
        Ok(())
    }

    /// Default evaluation interval for policies that don't set one.
    pub fn scan_interval(&self) -> Duration {
        match parse_duration(&self.scan_interval) {
            Ok(d) if !d.is_zero() => d,
            Ok(_) => DEFAULT_SCAN_INTERVAL,
            Err(e) => {
                warn!(error = %e, default = ?DEFAULT_SCAN_INTERVAL, "invalid scan_interval, using default");
                DEFAULT_SCAN_INTERVAL
            }
        }
    }

    pub fn poll_interval(&self) -> ConfigResult<Duration> {
        parse_duration(&self.policy_storage.poll_interval)
    }

    pub fn launch_timeout(&self) -> ConfigResult<Duration> {
        parse_duration(&self.plugins.launch_timeout)
    }

    pub fn kill_timeout(&self) -> ConfigResult<Duration> {
        parse_duration(&self.plugins.kill_timeout)
    }

    /// Configured metric sources followed by the built-in local-cluster one.
    pub fn metric_source_registrations(&self) -> Vec<ProviderRegistration> {
        let mut regs = self.apms.clone();
        regs.push(ProviderRegistration {
            name: LOCAL_CLUSTER.to_string(),
            driver: LOCAL_CLUSTER_APM_DRIVER.to_string(),
            config: self.cluster.provider_config(),
        });
        regs
    }

    /// Configured targets followed by the built-in local-cluster one.
    pub fn target_registrations(&self) -> Vec<ProviderRegistration> {
        let mut regs = self.targets.clone();
        regs.push(ProviderRegistration {
            name: LOCAL_CLUSTER.to_string(),
            driver: LOCAL_CLUSTER_TARGET_DRIVER.to_string(),
            config: self.cluster.provider_config(),
        });
        regs
    }

    pub fn strategy_registrations(&self) -> Vec<ProviderRegistration> {
        self.strategies.clone()
    }
}

impl ClusterConfig {
    fn provider_config(&self) -> ConfigMap {
        ConfigMap::from([
            ("address".to_string(), self.address.clone()),
            ("region".to_string(), self.region.clone()),
        ])
    }
}
