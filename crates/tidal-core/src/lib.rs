//! tidal-core — shared data model and configuration for the Tidal autoscaler.
//!
//! Everything that crosses a crate boundary lives here: scaling policies,
//! provider registrations, the strategy request/result values exchanged with
//! strategy providers, and the agent's TOML configuration.

pub mod config;
pub mod duration;
pub mod error;
pub mod types;

pub use config::AgentConfig;
pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};
pub use types::*;
