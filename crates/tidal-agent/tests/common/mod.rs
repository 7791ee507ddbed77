//! In-process fakes for driving the supervisor and pipeline.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use tidal_agent::Providers;
use tidal_core::{
    Action, ConfigMap, Policy, PolicyStrategy, PolicyTarget, RunRequest, RunResult,
};
use tidal_plugin::{MetricSource, ProviderError, Strategy, Target};
use tidal_policy::{PolicyFeed, PolicySource, PolicySourceError, StoreError};

// ── Policy source ──────────────────────────────────────────────────

/// Policy source driven by the test: `publish` pushes a set onto the
/// feed and makes its policies available to `get`.
#[derive(Default)]
pub struct FeedSource {
    policies: Mutex<HashMap<String, Policy>>,
    policies_tx: Mutex<Option<mpsc::Sender<Vec<Policy>>>>,
    errors_tx: Mutex<Option<mpsc::Sender<PolicySourceError>>>,
    gets: Mutex<HashMap<String, usize>>,
}

impl FeedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `set` the policies `get` answers with, without publishing.
    pub fn load(&self, set: &[Policy]) {
        *self.policies.lock().unwrap() =
            set.iter().map(|p| (p.id.clone(), p.clone())).collect();
    }

    pub async fn publish(&self, set: Vec<Policy>) {
        self.load(&set);
        let tx = self.policies_tx.lock().unwrap().clone();
        tx.expect("notify not called").send(set).await.unwrap();
    }

    pub async fn fail(&self, reason: &str) {
        let tx = self.errors_tx.lock().unwrap().clone();
        tx.expect("notify not called")
            .send(PolicySourceError::Store(StoreError::Read(reason.to_string())))
            .await
            .unwrap();
    }

    /// Number of `get` calls made for `id`.
    pub fn gets(&self, id: &str) -> usize {
        self.gets.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn total_gets(&self) -> usize {
        self.gets.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl PolicySource for FeedSource {
    fn notify(&self) -> PolicyFeed {
        let (policies_tx, policies) = mpsc::channel(1);
        let (errors_tx, errors) = mpsc::channel(1);
        *self.policies_tx.lock().unwrap() = Some(policies_tx);
        *self.errors_tx.lock().unwrap() = Some(errors_tx);
        PolicyFeed { policies, errors }
    }

    async fn get(&self, id: &str) -> Result<Policy, PolicySourceError> {
        *self.gets.lock().unwrap().entry(id.to_string()).or_default() += 1;
        self.policies
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| PolicySourceError::NotFound(id.to_string()))
    }
}

// ── Providers ──────────────────────────────────────────────────────

/// Target with a fixed count that records every call.
pub struct RecordingTarget {
    count: Result<i64, String>,
    pub counts: AtomicUsize,
    pub scaled: Mutex<Vec<(Action, ConfigMap)>>,
}

impl RecordingTarget {
    pub fn new(count: i64) -> Arc<Self> {
        Arc::new(Self {
            count: Ok(count),
            counts: AtomicUsize::new(0),
            scaled: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            count: Err(reason.to_string()),
            counts: AtomicUsize::new(0),
            scaled: Mutex::new(Vec::new()),
        })
    }

    pub fn count_calls(&self) -> usize {
        self.counts.load(Ordering::SeqCst)
    }

    pub fn scaled(&self) -> Vec<(Action, ConfigMap)> {
        self.scaled.lock().unwrap().clone()
    }
}

#[async_trait]
impl Target for RecordingTarget {
    async fn set_config(&self, _config: &ConfigMap) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn count(&self, _config: &ConfigMap) -> Result<i64, ProviderError> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        self.count.clone().map_err(ProviderError::Remote)
    }

    async fn scale(&self, action: &Action, config: &ConfigMap) -> Result<(), ProviderError> {
        self.scaled
            .lock()
            .unwrap()
            .push((action.clone(), config.clone()));
        Ok(())
    }
}

pub struct FixedSource(pub f64);

#[async_trait]
impl MetricSource for FixedSource {
    async fn set_config(&self, _config: &ConfigMap) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn query(&self, _query: &str) -> Result<f64, ProviderError> {
        Ok(self.0)
    }
}

/// Strategy that always returns the same actions.
pub struct FixedStrategy {
    actions: Vec<Action>,
    pub requests: Mutex<Vec<RunRequest>>,
}

impl FixedStrategy {
    pub fn new(actions: Vec<Action>) -> Arc<Self> {
        Arc::new(Self {
            actions,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Strategy for FixedStrategy {
    async fn set_config(&self, _config: &ConfigMap) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn run(&self, req: &RunRequest) -> Result<RunResult, ProviderError> {
        self.requests.lock().unwrap().push(req.clone());
        Ok(RunResult {
            actions: self.actions.clone(),
        })
    }
}

// ── Builders ───────────────────────────────────────────────────────

pub fn providers() -> Providers {
    Providers::new(Duration::from_secs(5), Duration::from_secs(2))
}

/// A policy against the `local` target and metric source and the
/// `fixed` strategy.
pub fn policy(id: &str) -> Policy {
    Policy {
        id: id.to_string(),
        source: "local".to_string(),
        query: "cpu".to_string(),
        target: PolicyTarget {
            name: "local".to_string(),
            config: ConfigMap::from([("job".to_string(), id.to_string())]),
        },
        strategy: PolicyStrategy {
            name: "fixed".to_string(),
            min: 1,
            max: 10,
            config: ConfigMap::new(),
        },
        interval: Duration::from_secs(1),
    }
}

pub fn policies(ids: &[&str]) -> Vec<Policy> {
    ids.iter().map(|id| policy(id)).collect()
}

/// Write a provider executable that completes the handshake for `kind`,
/// answers every request with an empty success and exits when its input
/// closes.
#[cfg(unix)]
pub fn write_plugin(dir: &std::path::Path, name: &str, kind: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let body = format!(
        "#!/bin/sh\necho '1|{kind}'\n\
         while read -r line; do\n\
           id=$(echo \"$line\" | sed 's/.*\"id\":\\([0-9]*\\).*/\\1/')\n\
           echo \"{{\\\"id\\\":$id,\\\"result\\\":null}}\"\n\
         done\n"
    );
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Write a provider executable that completes the handshake for `kind` and
/// then never reads its input.
#[cfg(unix)]
pub fn write_deaf_plugin(dir: &std::path::Path, name: &str, kind: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\necho '1|{kind}'\nexec sleep 30\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
