use anyhow::{Context, Result};
use api2csv::JobName;
use api2csv_config::RuntimeConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// HTTP-triggered jobs pulling third-party API data into CSV files
#[derive(Parser)]
#[command(name = "api2csv")]
#[command(version)]
#[command(about = "HTTP-triggered jobs pulling third-party API data into CSV files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// HTTP listen port (overrides config file)
    #[arg(short, long, value_name = "PORT", global = true)]
    port: Option<u16>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default if no subcommand given)
    Serve,
    /// Run one job immediately and exit
    Run {
        #[arg(value_enum)]
        job: JobName,

        /// Start date for the insights job (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        since: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build tokio runtime and run async main
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Step 1: Load base configuration
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load_or_default().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli);
    config.validate()?;

    // Step 3: Initialize tracing early so validation logs show up
    api2csv::init_tracing(&config);

    match cli.command {
        Some(Commands::Run { job, since }) => {
            let report = api2csv::run_once(config, job, since.as_deref()).await?;
            println!("{}", report.message);
            Ok(())
        }
        Some(Commands::Serve) | None => api2csv::run_with_config(config).await,
    }
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(port) = cli.port {
        config.server.listen_addr = format!("0.0.0.0:{}", port);
    }

    if let Some(level) = &cli.log_level {
        config.server.log_level = level.clone();
    }
}
