//! Dockhand CLI tool.

use clap::{Parser, Subcommand};
use dockhand_config::SystemConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "dockhand")]
#[command(about = "Build and push container images from git repositories", long_about = None)]
struct Cli {
    /// System configuration file
    #[arg(long, global = true, env = "DOCKHAND_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "DOCKHAND_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Claim and run jobs from the queue until interrupted
    Worker {
        /// Number of worker tasks, overriding the configuration
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Add a job to the queue
    Enqueue {
        #[command(flatten)]
        job: commands::JobArgs,
    },
    /// Run a job in this process without the queue
    Run {
        #[command(flatten)]
        job: commands::JobArgs,
    },
    /// Validate a build descriptor
    Validate {
        /// Path to the descriptor
        #[arg(default_value = dockhand_config::DEFAULT_DESCRIPTOR)]
        path: PathBuf,
    },
    /// Show queue sizes and recent failures
    Stats {
        /// Number of recent failures to list
        #[arg(long, default_value = "5")]
        failures: i64,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Commands::Validate { path } = &cli.command {
        return commands::validate(path);
    }

    let config = SystemConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Worker { workers } => {
            commands::worker::run(config, workers).await?;
        }
        Commands::Enqueue { job } => {
            commands::enqueue::run(&config, job).await?;
        }
        Commands::Run { job } => {
            commands::local::run(config, job).await?;
        }
        Commands::Stats { failures } => {
            commands::stats::run(&config, failures).await?;
        }
        Commands::Validate { .. } => {}
    }

    Ok(())
}
