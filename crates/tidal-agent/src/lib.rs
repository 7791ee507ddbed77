//! tidal-agent — the policy supervision and evaluation engine.
//!
//! Tracks the live policy set, runs one monitor task per policy, and drives
//! each policy's count → query → decide → act cycle through the provider
//! managers.
//!
//! # Architecture
//!
//! ```text
//! PolicySource ──notify()──► Supervisor
//!                              ├── policy_id → cancel signal
//!                              └── spawn / cancel ──► PolicyMonitor (one per policy)
//!                                                      ├── tick (per-policy interval)
//!                                                      ├── source.get(policy_id)
//!                                                      └── Evaluator::evaluate
//!                                                           ├── targets.dispense → count
//!                                                           ├── metric_sources.dispense → query
//!                                                           ├── strategies.dispense → run
//!                                                           └── target.scale(action) × N
//! ```
//!
//! Failures inside a cycle are logged with `policy_id`, `plugin`, `kind`
//! and `stage` fields and never leave the monitor. Only startup (config
//! validation, store open, plugin load) can fail [`run`].

pub mod agent;
pub mod error;
pub mod loader;
mod monitor;
pub mod pipeline;
pub mod providers;
pub mod supervisor;

pub use agent::run;
pub use error::{EvaluationError, ScaleFailure};
pub use loader::load_plugins;
pub use pipeline::{CycleOutcome, Evaluator};
pub use providers::Providers;
pub use supervisor::{Reconciled, Supervisor};
