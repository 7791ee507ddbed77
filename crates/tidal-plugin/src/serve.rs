//! Provider side of the plugin protocol.
//!
//! A provider binary builds its capability implementation and hands it to
//! one of the `serve_*` functions, which check the magic cookie, print the
//! handshake line and answer requests on stdin/stdout until the agent closes
//! stdin. Requests are dispatched concurrently. Stdout belongs to the
//! protocol; providers must log to stderr.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::capability::{MetricSource, Strategy, Target};
use crate::error::{ProviderError, ServeError};
use crate::handshake::{self, MAGIC_COOKIE_KEY};
use crate::kind::PluginKind;
use crate::rpc::{ConfigParams, QueryParams, Request, Response, ScaleParams, method};

/// Serve a metric source over stdin/stdout.
pub async fn serve_metric_source<M: MetricSource + 'static>(provider: M) -> Result<(), ServeError> {
    serve(PluginKind::Apm, Arc::new(MetricSourceDispatch(provider))).await
}

/// Serve a target over stdin/stdout.
pub async fn serve_target<T: Target + 'static>(provider: T) -> Result<(), ServeError> {
    serve(PluginKind::Target, Arc::new(TargetDispatch(provider))).await
}

/// Serve a strategy over stdin/stdout.
pub async fn serve_strategy<S: Strategy + 'static>(provider: S) -> Result<(), ServeError> {
    serve(PluginKind::Strategy, Arc::new(StrategyDispatch(provider))).await
}

async fn serve(kind: PluginKind, dispatch: Arc<dyn Dispatch>) -> Result<(), ServeError> {
    if !handshake::cookie_present() {
        return Err(ServeError::NotLaunchedByHost {
            key: MAGIC_COOKIE_KEY,
        });
    }

    let mut stdout = tokio::io::stdout();
    let line = format!("{}\n", handshake::handshake_line(kind));
    stdout.write_all(line.as_bytes()).await?;
    stdout.flush().await?;
    debug!(%kind, "handshake sent");

    serve_connection(dispatch, BufReader::new(tokio::io::stdin()), stdout).await
}

/// Answer requests from `reader` on `writer` until `reader` hits EOF and
/// every in-flight request has been answered.
pub(crate) async fn serve_connection<R, W>(
    dispatch: Arc<dyn Dispatch>,
    reader: R,
    mut writer: W,
) -> Result<(), ServeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Response>(64);

    let write_task = tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            let mut line = match serde_json::to_vec(&response) {
                Ok(l) => l,
                Err(e) => {
                    warn!(id = response.id, error = %e, "failed to encode response");
                    continue;
                }
            };
            line.push(b'\n');
            writer.write_all(&line).await?;
            writer.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "discarding malformed request");
                continue;
            }
        };

        let dispatch = Arc::clone(&dispatch);
        let tx = tx.clone();
        tokio::spawn(async move {
            let response = match dispatch.dispatch(&request.method, request.params).await {
                Ok(value) => Response::ok(request.id, value),
                Err(ProviderError::Remote(msg)) => Response::err(request.id, msg),
                Err(e) => Response::err(request.id, e.to_string()),
            };
            let _ = tx.send(response).await;
        });
    }
    drop(tx);

    match write_task.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "response writer task failed"),
    }
    debug!("agent closed the connection");
    Ok(())
}

/// Routes a wire method to a capability call.
#[async_trait]
pub(crate) trait Dispatch: Send + Sync {
    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

pub(crate) struct MetricSourceDispatch<M>(pub M);

#[async_trait]
impl<M: MetricSource> Dispatch for MetricSourceDispatch<M> {
    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        match method {
            method::SET_CONFIG => {
                let p: ConfigParams = serde_json::from_value(params)?;
                self.0.set_config(&p.config).await?;
                Ok(Value::Null)
            }
            method::QUERY => {
                let p: QueryParams = serde_json::from_value(params)?;
                Ok(serde_json::to_value(self.0.query(&p.query).await?)?)
            }
            other => Err(unknown_method(PluginKind::Apm, other)),
        }
    }
}

pub(crate) struct TargetDispatch<T>(pub T);

#[async_trait]
impl<T: Target> Dispatch for TargetDispatch<T> {
    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        match method {
            method::SET_CONFIG => {
                let p: ConfigParams = serde_json::from_value(params)?;
                self.0.set_config(&p.config).await?;
                Ok(Value::Null)
            }
            method::COUNT => {
                let p: ConfigParams = serde_json::from_value(params)?;
                Ok(serde_json::to_value(self.0.count(&p.config).await?)?)
            }
            method::SCALE => {
                let p: ScaleParams = serde_json::from_value(params)?;
                self.0.scale(&p.action, &p.config).await?;
                Ok(Value::Null)
            }
            other => Err(unknown_method(PluginKind::Target, other)),
        }
    }
}

pub(crate) struct StrategyDispatch<S>(pub S);

#[async_trait]
impl<S: Strategy> Dispatch for StrategyDispatch<S> {
    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        match method {
            method::SET_CONFIG => {
                let p: ConfigParams = serde_json::from_value(params)?;
                self.0.set_config(&p.config).await?;
                Ok(Value::Null)
            }
            method::RUN => {
                let req = serde_json::from_value(params)?;
                Ok(serde_json::to_value(self.0.run(&req).await?)?)
            }
            other => Err(unknown_method(PluginKind::Strategy, other)),
        }
    }
}

fn unknown_method(kind: PluginKind, method: &str) -> ProviderError {
    ProviderError::remote(format!("{kind} plugin does not implement {method:?}"))
}
