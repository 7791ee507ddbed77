//! The policy source contract and its store-backed implementation.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use tidal_core::Policy;

use crate::blocking::{find_max_found, index_has_change};
use crate::error::PolicySourceError;
use crate::store::PolicyStore;

/// The two feeds returned by [`PolicySource::notify`].
pub struct PolicyFeed {
    /// The full current policy set, each time it changes.
    pub policies: mpsc::Receiver<Vec<Policy>>,
    /// Fetch failures, delivered without a policy set.
    pub errors: mpsc::Receiver<PolicySourceError>,
}

/// Where the agent gets its policies from.
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Start watching for changes. The watch ends when the returned
    /// policy receiver is dropped.
    fn notify(&self) -> PolicyFeed;

    /// Fetch one policy by ID.
    async fn get(&self, id: &str) -> Result<Policy, PolicySourceError>;
}

/// Policy source that polls a [`PolicyStore`]'s modify index.
#[derive(Clone)]
pub struct StorePolicySource {
    store: PolicyStore,
    poll_interval: Duration,
}

impl StorePolicySource {
    pub fn new(store: PolicyStore, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
        }
    }
}

#[async_trait]
impl PolicySource for StorePolicySource {
    fn notify(&self) -> PolicyFeed {
        let (policies_tx, policies_rx) = mpsc::channel(1);
        let (errors_tx, errors_rx) = mpsc::channel(8);

        tokio::spawn(watch_store(
            self.store.clone(),
            self.poll_interval,
            policies_tx,
            errors_tx,
        ));

        PolicyFeed {
            policies: policies_rx,
            errors: errors_rx,
        }
    }

    async fn get(&self, id: &str) -> Result<Policy, PolicySourceError> {
        self.store
            .get_policy(id)?
            .ok_or_else(|| PolicySourceError::NotFound(id.to_string()))
    }
}

/// Poll the store and publish the policy list whenever its index advances.
/// The first successful read is always published.
async fn watch_store(
    store: PolicyStore,
    poll_interval: Duration,
    policies_tx: mpsc::Sender<Vec<Policy>>,
    errors_tx: mpsc::Sender<PolicySourceError>,
) {
    info!(?poll_interval, "policy watcher started");
    let mut last_index = 0;
    let mut published = false;

    loop {
        match store.snapshot() {
            Ok((index, policies)) => {
                if !published || index_has_change(index, last_index) {
                    debug!(index, count = policies.len(), "policy set changed");
                    if policies_tx.send(policies).await.is_err() {
                        break;
                    }
                    published = true;
                }
                last_index = find_max_found(index, last_index);
            }
            Err(e) => {
                let _ = errors_tx.send(PolicySourceError::Store(e)).await;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = policies_tx.closed() => break,
        }
    }

    debug!("policy watcher stopped");
}
