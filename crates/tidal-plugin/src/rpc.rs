//! Newline-delimited JSON RPC between the agent and a provider.
//!
//! Each request carries an `id`; the provider may answer out of order and
//! the client routes every response back to the waiting caller. Calls from
//! many tasks share one connection. Once the read side hits EOF or an I/O
//! error, all pending and future calls fail with `ConnectionClosed`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tidal_core::{Action, ConfigMap};

use crate::error::ProviderError;

/// Method names on the wire.
pub mod method {
    pub const SET_CONFIG: &str = "set_config";
    pub const QUERY: &str = "query";
    pub const COUNT: &str = "count";
    pub const SCALE: &str = "scale";
    pub const RUN: &str = "run";
}

// ── Frames ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: u64, error: String) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

// ── Params ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigParams {
    #[serde(default)]
    pub config: ConfigMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryParams {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleParams {
    pub action: Action,
    #[serde(default)]
    pub config: ConfigMap,
}

// ── Client ─────────────────────────────────────────────────────────

type Waiter = oneshot::Sender<Result<Value, ProviderError>>;

#[derive(Default)]
struct Pending {
    closed: bool,
    waiters: HashMap<u64, Waiter>,
}

type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Client half of a provider connection.
pub struct RpcClient {
    label: String,
    writer: tokio::sync::Mutex<Option<BoxWriter>>,
    pending: Arc<Mutex<Pending>>,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl RpcClient {
    /// Start a client over a provider's output (`reader`) and input (`writer`).
    ///
    /// `label` tags log lines, usually `kind/name`.
    pub fn new<R, W>(label: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let label = label.into();
        let pending = Arc::new(Mutex::new(Pending::default()));
        let reader = tokio::spawn(read_responses(label.clone(), reader, Arc::clone(&pending)));

        Self {
            label,
            writer: tokio::sync::Mutex::new(Some(Box::new(writer))),
            pending,
            next_id: AtomicU64::new(1),
            reader,
        }
    }

    /// Send `method` with `params` and wait for the matching response.
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, ProviderError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request {
            id,
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        };
        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = lock(&self.pending);
            if pending.closed {
                return Err(ProviderError::ConnectionClosed);
            }
            pending.waiters.insert(id, tx);
        }

        if let Err(e) = self.write_line(&line).await {
            lock(&self.pending).waiters.remove(&id);
            return Err(e);
        }

        let value = match rx.await {
            Ok(result) => result?,
            Err(_) => return Err(ProviderError::ConnectionClosed),
        };
        Ok(serde_json::from_value(value)?)
    }

    async fn write_line(&self, line: &[u8]) -> Result<(), ProviderError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ProviderError::ConnectionClosed)?;
        writer.write_all(line).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Close the write side. A well-behaved provider exits on EOF.
    pub async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(plugin = %self.label, error = %e, "error closing provider input");
            }
        }
    }

    /// Whether the read side has seen EOF.
    pub fn is_closed(&self) -> bool {
        lock(&self.pending).closed
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_responses<R>(label: String, reader: R, pending: Arc<Mutex<Pending>>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let response: Response = match serde_json::from_str(&line) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(plugin = %label, error = %e, "discarding malformed provider response");
                        continue;
                    }
                };
                let waiter = lock(&pending).waiters.remove(&response.id);
                let Some(waiter) = waiter else {
                    warn!(plugin = %label, id = response.id, "response for unknown request");
                    continue;
                };
                let result = match response.error {
                    Some(msg) => Err(ProviderError::Remote(msg)),
                    None => Ok(response.result.unwrap_or(Value::Null)),
                };
                let _ = waiter.send(result);
            }
            Ok(None) => {
                debug!(plugin = %label, "provider closed its output");
                break;
            }
            Err(e) => {
                warn!(plugin = %label, error = %e, "provider read failed");
                break;
            }
        }
    }

    let mut pending = lock(&pending);
    pending.closed = true;
    for (_, waiter) in pending.waiters.drain() {
        let _ = waiter.send(Err(ProviderError::ConnectionClosed));
    }
}

fn lock(pending: &Mutex<Pending>) -> std::sync::MutexGuard<'_, Pending> {
    // Poisoning is ignored: every critical section leaves the map consistent.
    pending.lock().unwrap_or_else(|e| e.into_inner())
}
