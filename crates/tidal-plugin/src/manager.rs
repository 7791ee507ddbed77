//! Named registry of providers of a single kind.
//!
//! The manager owns the provider processes it launched and hands out
//! reusable capability handles by name. Lookups happen on every evaluation
//! cycle from many policy monitors at once; the table sits behind an async
//! `RwLock` and each entry initializes its handle at most once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OnceCell, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::capability::{Capability, MetricSource, Strategy, Target};
use crate::error::PluginError;
use crate::process::{LaunchConfig, PluginProcess};

pub type MetricSourceManager = PluginManager<dyn MetricSource>;
pub type TargetManager = PluginManager<dyn Target>;
pub type StrategyManager = PluginManager<dyn Strategy>;

/// A registered provider: either a child process or an in-process handle.
struct PluginEntry<C: ?Sized> {
    process: Option<PluginProcess>,
    handle: OnceCell<Arc<C>>,
}

/// Registry of providers of capability `C`.
pub struct PluginManager<C: Capability + ?Sized> {
    plugins: RwLock<HashMap<String, Arc<PluginEntry<C>>>>,
    launch_timeout: Duration,
    kill_timeout: Duration,
}

impl<C: Capability + ?Sized> PluginManager<C> {
    /// Create an empty manager. Launches wait up to `launch_timeout` for a
    /// handshake; `kill` waits up to `kill_timeout` per process before
    /// killing it outright.
    pub fn new(launch_timeout: Duration, kill_timeout: Duration) -> Self {
        Self {
            plugins: RwLock::new(HashMap::new()),
            launch_timeout,
            kill_timeout,
        }
    }

    /// Launch the provider described by `launch` and register it as `name`.
    ///
    /// Registering an existing name replaces the entry; the replaced process
    /// is killed when its last handle is dropped.
    pub async fn register_plugin(&self, name: &str, launch: &LaunchConfig) -> Result<(), PluginError> {
        let process = PluginProcess::launch(name, C::KIND, launch, self.launch_timeout)
            .await
            .map_err(|source| PluginError::Launch {
                kind: C::KIND,
                name: name.to_string(),
                source,
            })?;

        self.insert(
            name,
            PluginEntry {
                process: Some(process),
                handle: OnceCell::new(),
            },
        )
        .await;
        Ok(())
    }

    /// Register an in-process implementation under `name`.
    pub async fn register_local(&self, name: &str, handle: Arc<C>) {
        self.insert(
            name,
            PluginEntry {
                process: None,
                handle: OnceCell::new_with(Some(handle)),
            },
        )
        .await;
    }

    async fn insert(&self, name: &str, entry: PluginEntry<C>) {
        let mut plugins = self.plugins.write().await;
        if plugins.insert(name.to_string(), Arc::new(entry)).is_some() {
            warn!(plugin = %name, kind = %C::KIND, "plugin re-registered, replacing previous entry");
        } else {
            debug!(plugin = %name, kind = %C::KIND, "plugin registered");
        }
    }

    /// Return the handle for `name`, connecting to the process on first use.
    pub async fn dispense(&self, name: &str) -> Result<Arc<C>, PluginError> {
        let entry = {
            let plugins = self.plugins.read().await;
            plugins.get(name).cloned()
        };
        let entry = entry.ok_or_else(|| PluginError::NotRegistered {
            kind: C::KIND,
            name: name.to_string(),
        })?;

        entry
            .handle
            .get_or_try_init(|| async {
                let process = entry.process.as_ref().ok_or_else(|| PluginError::Unavailable {
                    kind: C::KIND,
                    name: name.to_string(),
                    reason: "no process or local handle".to_string(),
                })?;
                let client = process.client().await?;
                Ok(C::remote(client))
            })
            .await
            .cloned()
    }

    /// Names of all registered providers, sorted.
    pub async fn names(&self) -> Vec<String> {
        let plugins = self.plugins.read().await;
        let mut names: Vec<String> = plugins.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn is_registered(&self, name: &str) -> bool {
        self.plugins.read().await.contains_key(name)
    }

    /// Terminate every provider process, concurrently. Each process gets
    /// `kill_timeout` to exit before it is killed. Idempotent; in-process
    /// providers are left alone.
    pub async fn kill(&self) {
        let entries: Vec<(String, Arc<PluginEntry<C>>)> = {
            let plugins = self.plugins.read().await;
            plugins
                .iter()
                .filter(|(_, e)| e.process.is_some())
                .map(|(n, e)| (n.clone(), Arc::clone(e)))
                .collect()
        };

        if entries.is_empty() {
            return;
        }
        info!(kind = %C::KIND, count = entries.len(), "killing plugins");

        let mut tasks = JoinSet::new();
        for (name, entry) in entries {
            let timeout = self.kill_timeout;
            tasks.spawn(async move {
                if let Some(process) = &entry.process {
                    process.kill(timeout).await;
                }
                name
            });
        }

        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(name) => debug!(plugin = %name, kind = %C::KIND, "plugin stopped"),
                Err(e) => warn!(kind = %C::KIND, error = %e, "plugin kill task failed"),
            }
        }
    }
}
