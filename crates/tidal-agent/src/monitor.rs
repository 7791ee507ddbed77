//! The per-policy evaluation loop.
//!
//! Each tick re-fetches the policy so edits (including its interval) take
//! effect without the supervisor restarting the task. A changed interval
//! replaces the ticker; the new period applies from the next wait.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use tidal_core::PolicyId;
use tidal_policy::PolicySource;

use crate::pipeline::Evaluator;

pub(crate) struct PolicyMonitor {
    pub policy_id: PolicyId,
    pub source: Arc<dyn PolicySource>,
    pub evaluator: Evaluator,
    pub default_interval: Duration,
}

impl PolicyMonitor {
    /// Run until `shutdown` fires or its sender is dropped.
    ///
    /// Cancellation is only observed while waiting; a cycle in progress
    /// always runs to completion first.
    pub(crate) async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let policy_id = &self.policy_id;
        let mut period = self.default_interval;
        let mut ticker = new_ticker(period);

        debug!(%policy_id, ?period, "policy monitor started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    debug!(%policy_id, "policy monitor stopping");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let policy = match self.source.get(policy_id).await {
                Ok(policy) => policy,
                Err(e) => {
                    warn!(%policy_id, error = %e, "failed to fetch policy, skipping cycle");
                    continue;
                }
            };

            let wanted = policy.effective_interval(self.default_interval);
            if wanted != period {
                debug!(%policy_id, from = ?period, to = ?wanted, "policy interval changed");
                period = wanted;
                ticker = new_ticker(period);
            }

            self.evaluator.evaluate(&policy).await;
        }
    }
}

/// A ticker whose first tick is one full period away.
fn new_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
