//! The three provider kinds.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    /// Metric source, queried for the current value of a policy's metric.
    Apm,
    /// Scaling target, counted and scaled.
    Target,
    /// Strategy, turns a count and a metric value into actions.
    Strategy,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Apm => "apm",
            PluginKind::Target => "target",
            PluginKind::Strategy => "strategy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "apm" => Some(PluginKind::Apm),
            "target" => Some(PluginKind::Target),
            "strategy" => Some(PluginKind::Strategy),
            _ => None,
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
