//! Target-value scaling.
//!
//! ```text
//! factor    = current_value / target
//! |1 - factor| <= threshold  → no action
//! desired   = ceil(current_count * factor), clamped to [min, max]
//! ```
//!
//! Config keys: `target` (required) and `threshold` (default 0.01). Values
//! set on the plugin with `set_config` act as defaults for every policy;
//! a policy's strategy config overrides them key by key.

use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use tidal_core::{Action, ConfigMap, RunRequest, RunResult};
use tidal_plugin::{ProviderError, Strategy};

const TARGET_KEY: &str = "target";
const THRESHOLD_KEY: &str = "threshold";
const DEFAULT_THRESHOLD: f64 = 0.01;

#[derive(Default)]
pub struct TargetValue {
    defaults: RwLock<ConfigMap>,
}

#[async_trait]
impl Strategy for TargetValue {
    async fn set_config(&self, config: &ConfigMap) -> Result<(), ProviderError> {
        if let Some(value) = config.get(TARGET_KEY) {
            parse(TARGET_KEY, value)?;
        }
        if let Some(value) = config.get(THRESHOLD_KEY) {
            parse(THRESHOLD_KEY, value)?;
        }
        *self.defaults.write().unwrap_or_else(|e| e.into_inner()) = config.clone();
        debug!(keys = config.len(), "strategy configured");
        Ok(())
    }

    async fn run(&self, req: &RunRequest) -> Result<RunResult, ProviderError> {
        let mut config = self
            .defaults
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        config.extend(req.config.iter().map(|(k, v)| (k.clone(), v.clone())));
        compute(req, &config)
    }
}

/// Decide the actions for one request against a merged config.
pub fn compute(req: &RunRequest, config: &ConfigMap) -> Result<RunResult, ProviderError> {
    let target = match config.get(TARGET_KEY) {
        Some(value) => parse(TARGET_KEY, value)?,
        None => return Err(ProviderError::remote("missing required config key \"target\"")),
    };
    if target <= 0.0 {
        return Err(ProviderError::remote(format!("target must be positive, got {target}")));
    }
    let threshold = match config.get(THRESHOLD_KEY) {
        Some(value) => parse(THRESHOLD_KEY, value)?,
        None => DEFAULT_THRESHOLD,
    };
    if !req.current_value.is_finite() {
        return Err(ProviderError::remote(format!(
            "metric value {} is not a number",
            req.current_value
        )));
    }
    if req.min_count > req.max_count {
        return Err(ProviderError::remote(format!(
            "min {} is greater than max {}",
            req.min_count, req.max_count
        )));
    }

    if req.current_count == 0 {
        return Ok(RunResult::default());
    }

    let factor = req.current_value / target;
    if (1.0 - factor).abs() <= threshold {
        debug!(factor, threshold, "within threshold");
        return Ok(RunResult::default());
    }

    let desired = (req.current_count as f64 * factor).ceil() as i64;
    let count = desired.clamp(req.min_count, req.max_count);
    if count == req.current_count {
        return Ok(RunResult::default());
    }

    let direction = if count > req.current_count { "out" } else { "in" };
    Ok(RunResult {
        actions: vec![Action::new(
            count,
            format!("scaling {direction} because factor is {factor:.6}"),
        )],
    })
}

fn parse(key: &str, value: &str) -> Result<f64, ProviderError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|e| ProviderError::remote(format!("invalid {key} {value:?}: {e}")))
}
