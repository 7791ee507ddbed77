//! Evaluation cycle failures, one variant per pipeline stage.

use thiserror::Error;

use tidal_plugin::{PluginError, PluginKind, ProviderError};

/// Why one evaluation cycle stopped early.
///
/// None of these ever leave the monitor that hit them; they are logged
/// and the next tick starts over.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("{0}")]
    ProviderUnavailable(#[from] PluginError),

    #[error("failed to read count from target {target:?}: {source}")]
    TargetQueryFailed {
        target: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to query metric source {metric_source:?}: {source}")]
    MetricQueryFailed {
        metric_source: String,
        #[source]
        source: ProviderError,
    },

    #[error("strategy {strategy:?} failed: {source}")]
    StrategyFailed {
        strategy: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to scale target {target:?} to {count}: {cause}")]
    ScaleFailed {
        target: String,
        count: i64,
        cause: ScaleFailure,
    },
}

#[derive(Debug, Error)]
pub enum ScaleFailure {
    #[error("count is outside [{min}, {max}]")]
    OutOfBounds { min: i64, max: i64 },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl EvaluationError {
    /// The pipeline stage that failed, for the `stage` log field.
    pub fn stage(&self) -> &'static str {
        match self {
            EvaluationError::ProviderUnavailable(_) => "dispense",
            EvaluationError::TargetQueryFailed { .. } => "count",
            EvaluationError::MetricQueryFailed { .. } => "query",
            EvaluationError::StrategyFailed { .. } => "run",
            EvaluationError::ScaleFailed { .. } => "scale",
        }
    }

    /// Kind of the provider involved.
    pub fn kind(&self) -> PluginKind {
        match self {
            EvaluationError::ProviderUnavailable(e) => e.kind(),
            EvaluationError::TargetQueryFailed { .. } | EvaluationError::ScaleFailed { .. } => {
                PluginKind::Target
            }
            EvaluationError::MetricQueryFailed { .. } => PluginKind::Apm,
            EvaluationError::StrategyFailed { .. } => PluginKind::Strategy,
        }
    }

    /// Name of the provider involved.
    pub fn plugin(&self) -> &str {
        match self {
            EvaluationError::ProviderUnavailable(e) => e.name(),
            EvaluationError::TargetQueryFailed { target, .. }
            | EvaluationError::ScaleFailed { target, .. } => target,
            EvaluationError::MetricQueryFailed { metric_source, .. } => metric_source,
            EvaluationError::StrategyFailed { strategy, .. } => strategy,
        }
    }
}
