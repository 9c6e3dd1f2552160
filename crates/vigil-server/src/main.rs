//! Vigil command-line entry point
//!
//! Serves the processing endpoint with the scheduler alongside, runs a single
//! pass on demand, or validates a configuration file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vigil_release::{CallerKey, ProcessRequest};
use vigil_server::{api, App, ReleaseScheduler, VigilConfig};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Vigil - releases protected messages when owners stop checking in", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "vigil.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve POST /process and run the scheduler
    Serve,

    /// Run one release pass and print the report as JSON
    Process {
        /// Release every active cycle regardless of deadline
        #[arg(long)]
        emergency: bool,

        /// Write the resulting store snapshot to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load and validate the configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = VigilConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Process { emergency, output } => process(config, emergency, output).await,
        Commands::CheckConfig => {
            println!("{} is valid", cli.config.display());
            Ok(())
        }
    }
}

async fn serve(config: VigilConfig) -> Result<()> {
    let addr = config.bind_addr()?;
    let app = App::from_config(&config).await?;

    let scheduler = config
        .scheduler
        .enabled
        .then(|| ReleaseScheduler::new(config.scheduler.interval()).start(app.engine.clone()));

    api::serve(app.engine.clone(), &config.server, addr, shutdown_signal())
        .await
        .context("http server failed")?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }
    info!("vigil stopped");
    Ok(())
}

async fn process(config: VigilConfig, emergency: bool, output: Option<PathBuf>) -> Result<()> {
    let app = App::from_config(&config).await?;
    let caller = CallerKey::from("cli");
    let request = if emergency {
        let credential = config
            .server
            .service_credential
            .as_ref()
            .map(|s| s.expose().to_string());
        ProcessRequest::emergency(caller, credential)
    } else {
        ProcessRequest::routine(caller)
    }
    .with_origin("cli");

    let report = app.engine.process(request).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = output {
        let snapshot = app.store.snapshot().await;
        tokio::fs::write(&path, serde_json::to_vec_pretty(&snapshot)?)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote store snapshot");
    }
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
