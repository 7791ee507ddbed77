//! tidal-plugin — capability providers hosted as isolated processes.
//!
//! A provider is a separate executable that implements one capability
//! (metric source, target or strategy). The agent launches it, checks a
//! versioned handshake, and talks to it over newline-delimited JSON on the
//! child's stdin/stdout. A crashing provider takes down only its own process.
//!
//! # Architecture
//!
//! ```text
//! PluginManager<dyn Capability>
//!   ├── name → PluginEntry
//!   │   ├── PluginProcess (child, handshake, stderr → tracing)
//!   │   │   └── RpcClient (lazy; multiplexed request/response)
//!   │   └── Arc<dyn Capability> (Remote* adapter or in-process impl)
//!   └── kill() → close stdin, wait, SIGKILL after kill_timeout
//! ```
//!
//! Provider executables use [`serve_metric_source`], [`serve_target`] or
//! [`serve_strategy`] to speak the other half of the protocol.

pub mod capability;
pub mod error;
pub mod handshake;
pub mod kind;
pub mod manager;
pub mod process;
pub mod remote;
pub mod rpc;
pub mod serve;

pub use capability::{Capability, MetricSource, Strategy, Target};
pub use error::{LaunchError, PluginError, ProviderError, ServeError};
pub use kind::PluginKind;
pub use manager::{MetricSourceManager, PluginManager, StrategyManager, TargetManager};
pub use process::LaunchConfig;
pub use rpc::RpcClient;
pub use serve::{serve_metric_source, serve_strategy, serve_target};
