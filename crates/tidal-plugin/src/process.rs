//! Provider child processes: launch, handshake, and termination.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{LaunchError, PluginError};
use crate::handshake::{
    self, MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE, PROTOCOL_VERSION, PROTOCOL_VERSION_KEY,
};
use crate::kind::PluginKind;
use crate::rpc::RpcClient;

/// How to start a provider executable.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchConfig {
    pub command: PathBuf,
    /// Extra environment for the child, on top of the handshake variables.
    pub env: Vec<(String, String)>,
}

impl LaunchConfig {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            env: Vec::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

type ChildIo = (BufReader<ChildStdout>, ChildStdin);

/// A running provider that has completed its handshake.
pub(crate) struct PluginProcess {
    name: String,
    kind: PluginKind,
    pid: Option<u32>,
    child: tokio::sync::Mutex<Option<Child>>,
    /// Handed to the RPC client on first connect.
    stdio: Mutex<Option<ChildIo>>,
    client: OnceCell<Arc<RpcClient>>,
}

impl PluginProcess {
    /// Spawn the executable and wait up to `timeout` for its handshake.
    pub(crate) async fn launch(
        name: &str,
        kind: PluginKind,
        config: &LaunchConfig,
        timeout: Duration,
    ) -> Result<Self, LaunchError> {
        let mut child = Command::new(&config.command)
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env(MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE)
            .env(PROTOCOL_VERSION_KEY, PROTOCOL_VERSION.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                command: config.command.display().to_string(),
                source,
            })?;

        let pid = child.id();

        if let Some(stderr) = child.stderr.take() {
            let name = name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(plugin = %name, %kind, "{line}");
                }
            });
        }

        let (Some(stdout), Some(stdin)) = (child.stdout.take(), child.stdin.take()) else {
            abandon(&mut child).await;
            return Err(LaunchError::Io(std::io::Error::other("child stdio not captured")));
        };
        let mut stdout = BufReader::new(stdout);

        let mut line = String::new();
        match tokio::time::timeout(timeout, stdout.read_line(&mut line)).await {
            Err(_) => {
                abandon(&mut child).await;
                return Err(LaunchError::HandshakeTimeout { timeout });
            }
            Ok(Err(e)) => {
                abandon(&mut child).await;
                return Err(LaunchError::Io(e));
            }
            Ok(Ok(0)) => {
                abandon(&mut child).await;
                return Err(LaunchError::Exited);
            }
            Ok(Ok(_)) => {}
        }

        if let Err(expected) = handshake::verify(kind, &line) {
            abandon(&mut child).await;
            return Err(LaunchError::HandshakeMismatch {
                expected,
                received: line.trim_end().to_string(),
            });
        }

        info!(plugin = %name, %kind, pid = ?pid, "plugin launched");

        Ok(Self {
            name: name.to_string(),
            kind,
            pid,
            child: tokio::sync::Mutex::new(Some(child)),
            stdio: Mutex::new(Some((stdout, stdin))),
            client: OnceCell::new(),
        })
    }

    /// The RPC connection, established on first use.
    pub(crate) async fn client(&self) -> Result<Arc<RpcClient>, PluginError> {
        self.client
            .get_or_try_init(|| async {
                let stdio = self.stdio.lock().unwrap_or_else(|e| e.into_inner()).take();
                let (stdout, stdin) = stdio.ok_or_else(|| PluginError::Unavailable {
                    kind: self.kind,
                    name: self.name.clone(),
                    reason: "plugin has been stopped".to_string(),
                })?;
                debug!(plugin = %self.name, kind = %self.kind, "connecting to plugin");
                let label = format!("{}/{}", self.kind, self.name);
                Ok(Arc::new(RpcClient::new(label, stdout, stdin)))
            })
            .await
            .cloned()
    }

    /// Ask the process to exit by closing its input, then kill it if it has
    /// not exited within `timeout`. Safe to call more than once.
    pub(crate) async fn kill(&self, timeout: Duration) {
        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };

        // Closing input can block behind an in-flight write to a provider
        // that stopped reading, so it shares the deadline with the wait.
        let graceful = async {
            match self.client.get() {
                Some(client) => client.close().await,
                None => drop(self.stdio.lock().unwrap_or_else(|e| e.into_inner()).take()),
            }
            child.wait().await
        };

        let outcome = tokio::time::timeout(timeout, graceful).await;
        match outcome {
            Ok(Ok(status)) => log_exit(&self.name, self.kind, status),
            Ok(Err(e)) => {
                warn!(plugin = %self.name, kind = %self.kind, error = %e, "failed to wait for plugin");
            }
            Err(_) => {
                warn!(
                    plugin = %self.name,
                    kind = %self.kind,
                    pid = ?self.pid,
                    ?timeout,
                    "plugin did not exit in time, killing"
                );
                if let Err(e) = child.kill().await {
                    warn!(plugin = %self.name, kind = %self.kind, error = %e, "failed to kill plugin");
                }
            }
        }
    }
}

fn log_exit(name: &str, kind: PluginKind, status: ExitStatus) {
    if status.success() {
        info!(plugin = %name, %kind, "plugin exited");
    } else {
        warn!(plugin = %name, %kind, %status, "plugin exited with failure");
    }
}

/// Kill a child that failed to launch properly.
async fn abandon(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!(error = %e, "failed to kill abandoned plugin process");
    }
}
