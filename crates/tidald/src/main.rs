//! tidald — the Tidal daemon.
//!
//! Runs the autoscaling agent and administers the policy store it reads.
//!
//! # Usage
//!
//! ```text
//! tidald agent --config /etc/tidal/agent.toml
//! tidald policy apply --policy-db /var/lib/tidal/policies.redb web.toml
//! tidald policy list
//! tidald policy delete web-cpu
//! ```

mod agent_mode;
mod policy_cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const DEFAULT_POLICY_DB: &str = "/var/lib/tidal/policies.redb";

#[derive(Parser)]
#[command(name = "tidald", about = "Tidal autoscaling daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the autoscaling agent until interrupted.
    Agent {
        /// Agent configuration file (TOML).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory holding provider executables.
        #[arg(long)]
        plugin_dir: Option<PathBuf>,

        /// Default policy evaluation interval, e.g. "10s".
        #[arg(long)]
        scan_interval: Option<String>,

        /// Policy store path.
        #[arg(long)]
        policy_db: Option<PathBuf>,
    },

    /// Manage stored scaling policies.
    Policy {
        /// Policy store path.
        #[arg(long, global = true, default_value = DEFAULT_POLICY_DB)]
        policy_db: PathBuf,

        #[command(subcommand)]
        command: PolicyCommand,
    },
}

#[derive(Subcommand)]
enum PolicyCommand {
    /// Insert or update every policy in a TOML policy file.
    Apply { file: PathBuf },
    /// Print all stored policies as JSON.
    List,
    /// Remove one policy.
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Agent {
            config,
            plugin_dir,
            scan_interval,
            policy_db,
        } => {
            let overrides = agent_mode::Overrides {
                plugin_dir,
                scan_interval,
                policy_db,
            };
            agent_mode::run_agent(config.as_deref(), overrides).await
        }
        Command::Policy { policy_db, command } => match command {
            PolicyCommand::Apply { file } => policy_cmd::apply(&policy_db, &file),
            PolicyCommand::List => policy_cmd::list(&policy_db),
            PolicyCommand::Delete { id } => policy_cmd::delete(&policy_db, &id),
        },
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tidald=debug,tidal=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
