//! Evaluation pipeline — one count → query → decide → act pass for a policy.
//!
//! ```text
//! dispense target   ─► count(target.config)
//! dispense source   ─► query(policy.query)
//! dispense strategy ─► run(RunRequest)
//!                       ├── no actions ─► done
//!                       └── actions    ─► scale(action, target.config), in order
//! ```
//!
//! Stages run strictly in sequence and the first failure ends the cycle.
//! Handles are dispensed fresh every cycle.

use std::sync::Arc;

use tracing::{debug, error, info};

use tidal_core::{Policy, RunRequest};

use crate::error::{EvaluationError, ScaleFailure};
use crate::providers::Providers;

/// How a successful cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The strategy returned no actions.
    NoAction,
    /// Every returned action was applied.
    Scaled { actions: usize },
}

/// Runs evaluation cycles against the shared provider managers.
#[derive(Clone)]
pub struct Evaluator {
    providers: Arc<Providers>,
}

impl Evaluator {
    pub fn new(providers: Arc<Providers>) -> Self {
        Self { providers }
    }

    /// Run one cycle and log its result. Never fails.
    pub async fn evaluate(&self, policy: &Policy) {
        match self.run_cycle(policy).await {
            Ok(CycleOutcome::NoAction) => {
                info!(policy_id = %policy.id, "no action");
            }
            Ok(CycleOutcome::Scaled { actions }) => {
                debug!(policy_id = %policy.id, actions, "evaluation cycle complete");
            }
            Err(e) => {
                error!(
                    policy_id = %policy.id,
                    plugin = %e.plugin(),
                    kind = %e.kind(),
                    stage = e.stage(),
                    error = %e,
                    "evaluation cycle failed"
                );
            }
        }
    }

    /// Run one cycle, returning the first stage failure.
    pub async fn run_cycle(&self, policy: &Policy) -> Result<CycleOutcome, EvaluationError> {
        let target_name = &policy.target.name;

        let target = self.providers.targets.dispense(target_name).await?;
        let current_count = target
            .count(&policy.target.config)
            .await
            .map_err(|source| EvaluationError::TargetQueryFailed {
                target: target_name.clone(),
                source,
            })?;

        let metric_source = self.providers.metric_sources.dispense(&policy.source).await?;
        let current_value = metric_source
            .query(&policy.query)
            .await
            .map_err(|source| EvaluationError::MetricQueryFailed {
                metric_source: policy.source.clone(),
                source,
            })?;

        debug!(
            policy_id = %policy.id,
            current_count,
            current_value,
            "target and metric read"
        );

        let strategy = self
            .providers
            .strategies
            .dispense(&policy.strategy.name)
            .await?;
        let request = RunRequest {
            current_count,
            min_count: policy.strategy.min,
            max_count: policy.strategy.max,
            current_value,
            config: policy.strategy.config.clone(),
        };
        let result = strategy
            .run(&request)
            .await
            .map_err(|source| EvaluationError::StrategyFailed {
                strategy: policy.strategy.name.clone(),
                source,
            })?;

        if result.actions.is_empty() {
            return Ok(CycleOutcome::NoAction);
        }

        for action in &result.actions {
            let scale_failed = |cause: ScaleFailure| EvaluationError::ScaleFailed {
                target: target_name.clone(),
                count: action.count,
                cause,
            };

            if !action.within(policy.strategy.min, policy.strategy.max) {
                return Err(scale_failed(ScaleFailure::OutOfBounds {
                    min: policy.strategy.min,
                    max: policy.strategy.max,
                }));
            }

            info!(
                policy_id = %policy.id,
                target = %target_name,
                from = current_count,
                to = action.count,
                reason = %action.reason,
                "scaling target"
            );
            target
                .scale(action, &policy.target.config)
                .await
                .map_err(|e| scale_failed(e.into()))?;
        }

        Ok(CycleOutcome::Scaled {
            actions: result.actions.len(),
        })
    }
}
