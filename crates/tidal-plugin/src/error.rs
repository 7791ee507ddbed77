//! Error types for provider launch, lookup, and calls.

use std::time::Duration;

use thiserror::Error;

use crate::kind::PluginKind;

/// A provider process could not be started or failed its handshake.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no handshake within {timeout:?}")]
    HandshakeTimeout { timeout: Duration },

    #[error("handshake mismatch: expected {expected:?}, got {received:?}")]
    HandshakeMismatch { expected: String, received: String },

    #[error("process exited before completing the handshake")]
    Exited,

    #[error("i/o error during launch: {0}")]
    Io(#[from] std::io::Error),
}

/// Lookup and lifecycle failures surfaced by a `PluginManager`.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{kind} plugin {name:?} is not registered")]
    NotRegistered { kind: PluginKind, name: String },

    #[error("failed to launch {kind} plugin {name:?}: {source}")]
    Launch {
        kind: PluginKind,
        name: String,
        #[source]
        source: LaunchError,
    },

    #[error("{kind} plugin {name:?} is unavailable: {reason}")]
    Unavailable {
        kind: PluginKind,
        name: String,
        reason: String,
    },
}

impl PluginError {
    pub fn kind(&self) -> PluginKind {
        match self {
            PluginError::NotRegistered { kind, .. }
            | PluginError::Launch { kind, .. }
            | PluginError::Unavailable { kind, .. } => *kind,
        }
    }

    /// Name of the plugin the error is about.
    pub fn name(&self) -> &str {
        match self {
            PluginError::NotRegistered { name, .. }
            | PluginError::Launch { name, .. }
            | PluginError::Unavailable { name, .. } => name,
        }
    }
}

/// A capability call (`set_config`, `query`, `count`, `scale`, `run`) failed.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider handled the call and reported an error.
    #[error("{0}")]
    Remote(String),

    #[error("provider connection closed")]
    ConnectionClosed,

    #[error("malformed provider message: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("provider i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn remote(msg: impl Into<String>) -> Self {
        ProviderError::Remote(msg.into())
    }
}

/// Failures on the provider side of the protocol.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error(
        "this binary is a tidal plugin and must be launched by the tidal agent \
         (magic cookie {key} missing or wrong)"
    )]
    NotLaunchedByHost { key: &'static str },

    #[error("plugin i/o failed: {0}")]
    Io(#[from] std::io::Error),
}
