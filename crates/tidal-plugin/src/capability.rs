//! Capability contracts the agent depends on.
//!
//! The agent only ever sees these traits. A handle may be a `Remote*`
//! adapter over a provider process or an in-process implementation
//! registered with [`PluginManager::register_local`]. Handles are shared
//! across policy monitors and called concurrently; a provider that cannot
//! cope with concurrent calls must serialize them itself.
//!
//! [`PluginManager::register_local`]: crate::manager::PluginManager::register_local

use std::sync::Arc;

use async_trait::async_trait;

use tidal_core::{Action, ConfigMap, RunRequest, RunResult};

use crate::error::ProviderError;
use crate::kind::PluginKind;
use crate::remote::{RemoteMetricSource, RemoteStrategy, RemoteTarget};
use crate::rpc::RpcClient;

/// Source of metric values.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Called once at registration with the provider's static config.
    async fn set_config(&self, config: &ConfigMap) -> Result<(), ProviderError>;

    async fn query(&self, query: &str) -> Result<f64, ProviderError>;
}

/// Something with a capacity that can be read and changed.
#[async_trait]
pub trait Target: Send + Sync {
    async fn set_config(&self, config: &ConfigMap) -> Result<(), ProviderError>;

    /// Current capacity of the target described by `config`.
    async fn count(&self, config: &ConfigMap) -> Result<i64, ProviderError>;

    async fn scale(&self, action: &Action, config: &ConfigMap) -> Result<(), ProviderError>;
}

/// Turns a current count and metric value into scaling actions.
#[async_trait]
pub trait Strategy: Send + Sync {
    async fn set_config(&self, config: &ConfigMap) -> Result<(), ProviderError>;

    async fn run(&self, req: &RunRequest) -> Result<RunResult, ProviderError>;
}

/// Ties a capability trait object to its provider kind and remote adapter.
pub trait Capability: Send + Sync + 'static {
    const KIND: PluginKind;

    /// Wrap an established connection as a handle of this capability.
    fn remote(client: Arc<RpcClient>) -> Arc<Self>;
}

impl Capability for dyn MetricSource {
    const KIND: PluginKind = PluginKind::Apm;

    fn remote(client: Arc<RpcClient>) -> Arc<Self> {
        Arc::new(RemoteMetricSource::new(client))
    }
}

impl Capability for dyn Target {
    const KIND: PluginKind = PluginKind::Target;

    fn remote(client: Arc<RpcClient>) -> Arc<Self> {
        Arc::new(RemoteTarget::new(client))
    }
}

impl Capability for dyn Strategy {
    const KIND: PluginKind = PluginKind::Strategy;

    fn remote(client: Arc<RpcClient>) -> Arc<Self> {
        Arc::new(RemoteStrategy::new(client))
    }
}
