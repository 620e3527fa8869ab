mod backend;
mod check;
mod config;
mod journey;
mod logging;
mod paths;
mod progress;
mod resources;
mod server;

use crate::config::Config;
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "fundroad", version)]
#[command(about = "Fund Road — staged journey progress backend", long_about = None)]
struct Cli {
    /// Port for the API server
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the API server (default)
    Serve,
    /// Compute a user's progress aggregate and print it as JSON
    Progress {
        /// User id to aggregate
        #[arg(long)]
        user: String,

        /// Restrict output to one step
        #[arg(long)]
        step: Option<u32>,
    },
    /// Diagnose configuration, rule table, and backend health
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, config_path) = Config::load_with_path()?;
    config.validate()?;

    let log_dir = match logging::setup_tracing_with_settings(logging::LoggingSettings {
        level: config.logging.level.as_deref(),
        directory: config.logging.directory.as_deref(),
        retention_days: config.logging.retention_days,
    }) {
        Ok(path) => Some(path),
        Err(err) => {
            eprintln!("Failed to initialize logging: {err}");
            None
        }
    };

    match cli.cmd.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!("--- Fund Road Startup ---");
            if let Some(path) = config_path.as_ref() {
                tracing::info!("Config File: {}", path.display());
            } else {
                tracing::info!("Config File: (default)");
            }
            tracing::info!("Backend URL: {}", config.backend.url);
            tracing::info!("Resources Table: {}", config.backend.resources_table);
            tracing::info!(
                "Refresh Interval: {}s",
                config.progress.refresh_interval_secs
            );
            if let Some(dir) = log_dir.as_ref() {
                tracing::info!("Log Directory: {}", dir.display());
            }
            tracing::info!("-------------------------");

            server::start_server(config, cli.port).await?;
        }
        Command::Progress { user, step } => {
            let client = backend::BackendClient::new(&config.backend)?;
            let records = client.fetch_resources(&user).await?;
            let aggregate = progress::aggregate_records(&records);
            match step {
                Some(step_id) => {
                    let step_progress = aggregate
                        .details_by_step
                        .get(&step_id)
                        .copied()
                        .unwrap_or_default();
                    println!("{}", serde_json::to_string_pretty(&step_progress)?);
                }
                None => println!("{}", serde_json::to_string_pretty(&aggregate)?),
            }
        }
        Command::Check => check::run(&config).await?,
    }

    Ok(())
}
