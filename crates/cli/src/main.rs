mod commands;
mod metrics;
mod progress;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dossier_core::{load_config, validate_config, Config, SanitizedConfig};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default log filter when neither `RUST_LOG` nor `[logging].filter` is set.
const DEFAULT_FILTER: &str = "info";

/// Downloads GDEBA case files, packages them and delivers the archives over SFTP.
#[derive(Debug, Parser)]
#[command(name = "dossier", version, about)]
struct Cli {
    /// Configuration file
    #[arg(long, short, env = "DOSSIER_CONFIG", default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Process every pending case file and deliver the archives
    Run,
    /// Replace the queue with the identifiers of a CSV file
    Load {
        /// CSV file, one identifier per line in the first column
        csv: PathBuf,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Download and package a single case file without delivering it
    Fetch {
        /// Case-file identifier
        case_file: String,
    },
    /// Deliver the archive of a case file
    Send {
        /// Case-file identifier or archive name (`<id>.zip`)
        case_file: String,
    },
    /// Check whether the archive of a case file exists remotely
    Find {
        /// Case-file identifier or archive name (`<id>.zip`)
        case_file: String,
    },
    /// Print the number of pending case files
    Pending,
    /// Check the delivery endpoint accepts connections
    CheckServer,
}

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything requested was done.
    Success,
    /// Finished, but some case files were not delivered.
    Partial,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Partial => ExitCode::from(2),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            // Logging may not be initialized yet (bad config), so print as well.
            tracing::error!("Fatal error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Outcome> {
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    validate_config(&config).context("Configuration validation failed")?;

    init_logging(&config)?;
    info!(version = VERSION, config = ?cli.config, "Configuration loaded");
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let sanitized = SanitizedConfig::from(&config);
    info!(
        config = %serde_json::to_string(&sanitized).unwrap_or_default(),
        config_hash = &config_hash[..16],
        "Effective configuration"
    );

    let outcome = match cli.command {
        Command::Run => commands::run(&config).await,
        Command::Load { csv, yes } => commands::load(&config, &csv, yes),
        Command::Fetch { case_file } => commands::fetch(&config, &case_file).await,
        Command::Send { case_file } => commands::send(&config, &case_file).await,
        Command::Find { case_file } => commands::find(&config, &case_file).await,
        Command::Pending => commands::pending(&config),
        Command::CheckServer => commands::check_server(&config).await,
    };

    if let Some(path) = &config.metrics.textfile {
        if let Err(e) = metrics::write_textfile(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write metrics file");
        }
    }
    outcome
}

/// Stderr plus, when configured, an appended plain-text log file.
fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        config
            .logging
            .filter
            .as_deref()
            .unwrap_or(DEFAULT_FILTER)
            .into()
    });

    let file_layer = match &config.logging.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {:?}", parent))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}
