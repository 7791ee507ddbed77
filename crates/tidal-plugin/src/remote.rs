//! Capability adapters that forward calls to a provider process.

use std::sync::Arc;

use async_trait::async_trait;

use tidal_core::{Action, ConfigMap, RunRequest, RunResult};

use crate::capability::{MetricSource, Strategy, Target};
use crate::error::ProviderError;
use crate::rpc::{ConfigParams, QueryParams, RpcClient, ScaleParams, method};

pub struct RemoteMetricSource {
    client: Arc<RpcClient>,
}

impl RemoteMetricSource {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricSource for RemoteMetricSource {
    async fn set_config(&self, config: &ConfigMap) -> Result<(), ProviderError> {
        set_config(&self.client, config).await
    }

    async fn query(&self, query: &str) -> Result<f64, ProviderError> {
        let params = QueryParams {
            query: query.to_string(),
        };
        self.client.call(method::QUERY, &params).await
    }
}

pub struct RemoteTarget {
    client: Arc<RpcClient>,
}

impl RemoteTarget {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Target for RemoteTarget {
    async fn set_config(&self, config: &ConfigMap) -> Result<(), ProviderError> {
        set_config(&self.client, config).await
    }

    async fn count(&self, config: &ConfigMap) -> Result<i64, ProviderError> {
        let params = ConfigParams {
            config: config.clone(),
        };
        self.client.call(method::COUNT, &params).await
    }

    async fn scale(&self, action: &Action, config: &ConfigMap) -> Result<(), ProviderError> {
        let params = ScaleParams {
            action: action.clone(),
            config: config.clone(),
        };
        self.client.call(method::SCALE, &params).await
    }
}

pub struct RemoteStrategy {
    client: Arc<RpcClient>,
}

impl RemoteStrategy {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Strategy for RemoteStrategy {
    async fn set_config(&self, config: &ConfigMap) -> Result<(), ProviderError> {
        set_config(&self.client, config).await
    }

    async fn run(&self, req: &RunRequest) -> Result<RunResult, ProviderError> {
        self.client.call(method::RUN, req).await
    }
}

async fn set_config(client: &RpcClient, config: &ConfigMap) -> Result<(), ProviderError> {
    let params = ConfigParams {
        config: config.clone(),
    };
    client.call(method::SET_CONFIG, &params).await
}
