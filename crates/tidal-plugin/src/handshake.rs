//! Host/provider handshake.
//!
//! The host passes a magic cookie and its protocol version through the
//! environment. A provider that finds the right cookie answers with a single
//! `<version>|<kind>` line on stdout before any RPC traffic. Anything else on
//! that first line is fatal for the registration and is never retried.

use crate::kind::PluginKind;

/// Bumped whenever the wire format changes incompatibly.
pub const PROTOCOL_VERSION: u32 = 1;

pub const MAGIC_COOKIE_KEY: &str = "TIDAL_PLUGIN_MAGIC_COOKIE";

/// Not a secret; it only stops a provider binary from being run by hand.
pub const MAGIC_COOKIE_VALUE: &str = "d3c1a8f2e07b4b5c9e6a1f0b8d7c2e41";

pub const PROTOCOL_VERSION_KEY: &str = "TIDAL_PLUGIN_PROTOCOL_VERSION";

/// The line a provider of `kind` must print.
pub fn handshake_line(kind: PluginKind) -> String {
    format!("{PROTOCOL_VERSION}|{kind}")
}

/// Split a handshake line into its protocol version and provider kind.
pub fn parse_line(line: &str) -> Option<(u32, PluginKind)> {
    let (version, kind) = line.trim_end_matches(['\r', '\n']).split_once('|')?;
    Some((version.parse().ok()?, PluginKind::parse(kind)?))
}

/// Validate the first line a provider printed. On mismatch, returns the
/// line that was expected.
pub fn verify(kind: PluginKind, line: &str) -> Result<(), String> {
    match parse_line(line) {
        Some((PROTOCOL_VERSION, received)) if received == kind => Ok(()),
        _ => Err(handshake_line(kind)),
    }
}

/// Whether the current process was launched by a tidal agent.
pub fn cookie_present() -> bool {
    std::env::var(MAGIC_COOKIE_KEY).is_ok_and(|v| v == MAGIC_COOKIE_VALUE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_line() {
        assert!(verify(PluginKind::Strategy, "1|strategy\n").is_ok());
        assert!(verify(PluginKind::Apm, "1|apm").is_ok());
    }

    #[test]
    fn rejects_wrong_kind_or_version() {
        assert_eq!(
            verify(PluginKind::Target, "1|strategy"),
            Err("1|target".to_string())
        );
        assert!(verify(PluginKind::Target, "2|target").is_err());
        assert!(verify(PluginKind::Target, "hello world").is_err());
        assert!(verify(PluginKind::Target, "1|target|extra").is_err());
    }

    #[test]
    fn parse_line_reads_version_and_kind() {
        assert_eq!(parse_line("1|apm\n"), Some((1, PluginKind::Apm)));
        assert_eq!(parse_line("7|strategy"), Some((7, PluginKind::Strategy)));
        assert_eq!(parse_line("1|database"), None);
        assert_eq!(parse_line("v1|apm"), None);
        assert_eq!(parse_line("apm"), None);
    }
}
