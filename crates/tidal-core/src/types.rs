//! Domain types shared across Tidal crates.
//!
//! Policies are produced by a policy source and fetched fresh on every
//! monitor tick; the agent never mutates them in place. The strategy types
//! (`RunRequest`, `RunResult`, `Action`) are the values exchanged with
//! strategy and target providers and are serialized on the plugin wire.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unique identifier of a scaling policy.
pub type PolicyId = String;

/// Opaque string-keyed configuration handed to providers untouched.
pub type ConfigMap = HashMap<String, String>;

// ── Policy ─────────────────────────────────────────────────────────

/// A scaling rule binding a metric query, a strategy and a target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    pub id: PolicyId,
    /// Name of the metric-source provider to query.
    pub source: String,
    /// Opaque query string passed to the metric source.
    pub query: String,
    pub target: PolicyTarget,
    pub strategy: PolicyStrategy,
    /// Re-evaluation period. Zero means "use the agent default".
    #[serde(default, with = "crate::duration::serde")]
    pub interval: Duration,
}

impl Policy {
    /// The interval the policy's monitor should tick at.
    pub fn effective_interval(&self, default: Duration) -> Duration {
        if self.interval.is_zero() {
            default
        } else {
            self.interval
        }
    }
}

/// The scaling target a policy acts on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PolicyTarget {
    /// Name of the target provider.
    pub name: String,
    #[serde(default)]
    pub config: ConfigMap,
}

/// The strategy a policy uses to compute a desired count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PolicyStrategy {
    /// Name of the strategy provider.
    pub name: String,
    pub min: i64,
    pub max: i64,
    #[serde(default)]
    pub config: ConfigMap,
}

// ── Providers ──────────────────────────────────────────────────────

/// A provider to launch and configure at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderRegistration {
    /// Name policies use to refer to this provider.
    pub name: String,
    /// Executable name, resolved under the agent's plugin directory.
    pub driver: String,
    #[serde(default)]
    pub config: ConfigMap,
}

// ── Strategy exchange ──────────────────────────────────────────────

/// Input to a strategy provider for one evaluation cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRequest {
    pub current_count: i64,
    pub min_count: i64,
    pub max_count: i64,
    pub current_value: f64,
    #[serde(default)]
    pub config: ConfigMap,
}

/// Ordered actions returned by a strategy. Empty means "nothing to do".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RunResult {
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// A single scaling step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    /// Desired capacity.
    pub count: i64,
    /// Human-readable justification.
    pub reason: String,
}

impl Action {
    pub fn new(count: i64, reason: impl Into<String>) -> Self {
        Self {
            count,
            reason: reason.into(),
        }
    }

    /// Whether the action's count lies within `[min, max]`.
    pub fn within(&self, min: i64, max: i64) -> bool {
        (min..=max).contains(&self.count)
    }
}
