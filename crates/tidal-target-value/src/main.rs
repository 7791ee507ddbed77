//! tidal-target-value — the target-value strategy provider.
//!
//! Launched by the agent as a strategy plugin; not meant to be run by hand.
//! Logs go to stderr, which the agent forwards into its own log.

mod strategy;

use tracing_subscriber::EnvFilter;

use strategy::TargetValue;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tidal_target_value=debug")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .without_time()
        .init();

    tidal_plugin::serve_strategy(TargetValue::default()).await?;
    Ok(())
}
