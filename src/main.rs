use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use job_scout::app_log;
use job_scout::cli::{handle_command, Cli};
use job_scout::AgentConfig;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Logs directory from the configuration file when it can be read.
fn logs_dir(config_path: &Path) -> PathBuf {
    std::fs::read_to_string(config_path)
        .ok()
        .and_then(|content| serde_yaml::from_str::<AgentConfig>(&content).ok())
        .map(|config| config.paths.logs_dir)
        .unwrap_or_else(|| PathBuf::from("logs"))
}

fn init_logging(logs_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create logs directory: {}", logs_dir.display()))?;
    let log_path = logs_dir.join(format!(
        "job_search_{}.log",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(false)
                .with_span_list(false),
        )
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    Ok(log_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = init_logging(&logs_dir(&cli.config))?;
    app_log!(info, "Logging to {}", log_path.display());

    if let Err(e) = handle_command(cli).await {
        app_log!(error, "{:#}", e);
        return Err(e);
    }
    Ok(())
}
