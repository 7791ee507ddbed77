//! Policy supervisor — keeps one monitor running per live policy.
//!
//! The supervisor consumes the policy source's change feed and reconciles
//! each delivered set against the running monitors by set difference:
//! new IDs get a monitor, vanished IDs are cancelled, and policies that
//! persist across updates keep their existing task.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

use tidal_core::{Policy, PolicyId};
use tidal_policy::{PolicyFeed, PolicySource};

use crate::monitor::PolicyMonitor;
use crate::pipeline::Evaluator;
use crate::providers::Providers;

/// Monitors started and stopped by one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reconciled {
    pub started: usize,
    pub stopped: usize,
}

pub struct Supervisor {
    source: Arc<dyn PolicySource>,
    providers: Arc<Providers>,
    evaluator: Evaluator,
    default_interval: Duration,
    /// Active monitors: policy_id → cancellation signal. Monitor tasks are
    /// detached and exit on their own once signalled.
    monitors: RwLock<HashMap<PolicyId, watch::Sender<bool>>>,
}

impl Supervisor {
    pub fn new(
        source: Arc<dyn PolicySource>,
        providers: Arc<Providers>,
        default_interval: Duration,
    ) -> Self {
        Self {
            source,
            evaluator: Evaluator::new(Arc::clone(&providers)),
            providers,
            default_interval,
            monitors: RwLock::new(HashMap::new()),
        }
    }

    /// Consume the policy feed until `shutdown` fires, then cancel every
    /// monitor and stop all providers.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let PolicyFeed {
            mut policies,
            mut errors,
        } = self.source.notify();
        let mut policies_open = true;
        let mut errors_open = true;

        info!(default_interval = ?self.default_interval, "policy supervisor started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("shutdown signal received, stopping policy supervisor");
                    break;
                }
                set = policies.recv(), if policies_open => match set {
                    Some(set) => {
                        self.reconcile(set).await;
                    }
                    None => {
                        warn!("policy feed closed, keeping current monitors");
                        policies_open = false;
                    }
                },
                err = errors.recv(), if errors_open => match err {
                    Some(e) => error!(error = %e, "policy source error, keeping current monitors"),
                    None => errors_open = false,
                },
            }
        }

        self.stop().await;
    }

    /// Align the running monitors with `policies`.
    pub async fn reconcile(&self, policies: Vec<Policy>) -> Reconciled {
        let wanted: HashSet<&str> = policies.iter().map(|p| p.id.as_str()).collect();
        let mut monitors = self.monitors.write().await;
        let mut result = Reconciled::default();

        monitors.retain(|id, cancel| {
            if wanted.contains(id.as_str()) {
                return true;
            }
            let _ = cancel.send(true);
            info!(policy_id = %id, "policy removed, monitor stopped");
            result.stopped += 1;
            false
        });

        for policy in &policies {
            if monitors.contains_key(&policy.id) {
                continue;
            }
            monitors.insert(policy.id.clone(), self.spawn_monitor(&policy.id));
            info!(policy_id = %policy.id, "policy added, monitor started");
            result.started += 1;
        }

        debug!(
            active = monitors.len(),
            started = result.started,
            stopped = result.stopped,
            "policies reconciled"
        );
        result
    }

    fn spawn_monitor(&self, policy_id: &str) -> watch::Sender<bool> {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let monitor = PolicyMonitor {
            policy_id: policy_id.to_string(),
            source: Arc::clone(&self.source),
            evaluator: self.evaluator.clone(),
            default_interval: self.default_interval,
        };
        tokio::spawn(monitor.run(cancel_rx));
        cancel_tx
    }

    /// IDs of policies with a monitor, sorted.
    pub async fn active_policies(&self) -> Vec<PolicyId> {
        let monitors = self.monitors.read().await;
        let mut ids: Vec<PolicyId> = monitors.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Signal every monitor without waiting for it, then kill providers.
    /// A cycle still in flight may fail against a stopped provider; that
    /// failure is logged like any other.
    async fn stop(&self) {
        {
            let mut monitors = self.monitors.write().await;
            for (id, cancel) in monitors.drain() {
                let _ = cancel.send(true);
                debug!(policy_id = %id, "policy monitor cancelled");
            }
        }
        info!("all policy monitors cancelled");

        self.providers.kill().await;
        info!("policy supervisor stopped");
    }
}
