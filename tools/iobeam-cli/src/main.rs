//! iobeam CLI - host client for the iobeam telemetry API
//!
//! Registers this machine as a device, syncs its clock against the API and
//! uploads measurements, using the same protocol engine as the firmware.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod clock;
mod commands;
mod config;
mod net;
mod storage;

use config::{FileConfig, Overrides, Settings};

/// iobeam - register, sync and upload from the command line
#[derive(Parser)]
#[command(name = "iobeam")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Project id
    #[arg(long, global = true, env = "IOBEAM_PROJECT_ID")]
    project_id: Option<u32>,

    /// Project token
    #[arg(long, global = true, env = "IOBEAM_PROJECT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// API host
    #[arg(long, global = true, env = "IOBEAM_HOST")]
    host: Option<String>,

    /// API port
    #[arg(long, global = true, env = "IOBEAM_PORT")]
    port: Option<u16>,

    /// Directory holding the device identity record
    #[arg(long, global = true, env = "IOBEAM_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register this device (no-op if already registered)
    Register,

    /// Run one clock sync round and print the offset
    Sync,

    /// Upload one measurement
    Send {
        /// Series name
        key: String,

        /// Value; anything with a '.' or exponent is sent as a float
        #[arg(allow_negative_numbers = true)]
        value: String,

        /// Timestamp in milliseconds since the epoch (default: synced clock)
        #[arg(short, long)]
        time: Option<u64>,
    },

    /// Read a number from a file on an interval and upload it
    Run {
        /// Series name
        #[arg(short, long)]
        key: String,

        /// File to read (e.g. /sys/class/thermal/thermal_zone0/temp)
        #[arg(short, long)]
        source: PathBuf,

        /// Seconds between uploads
        #[arg(short, long, default_value = "60")]
        interval_secs: u64,

        /// Factor applied to each reading
        #[arg(long, default_value = "1.0")]
        scale: f64,

        /// Stop after this many uploads (0 = forever)
        #[arg(short = 'n', long, default_value = "0")]
        count: u64,
    },

    /// Delete the persisted device identity
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs)?;

    let file = FileConfig::discover(cli.config.as_deref())?;
    let overrides = Overrides {
        project_id: cli.project_id,
        project_token: cli.token,
        host: cli.host,
        port: cli.port,
        state_dir: cli.state_dir,
    };
    let settings = Settings::resolve(file, overrides).context("Incomplete configuration")?;

    match cli.command {
        Commands::Register => commands::register(&settings),
        Commands::Sync => commands::sync(&settings),
        Commands::Send { key, value, time } => commands::send(&settings, &key, &value, time),
        Commands::Run {
            key,
            source,
            interval_secs,
            scale,
            count,
        } => commands::run(
            &settings,
            &commands::RunOptions {
                key,
                source,
                interval_secs,
                scale,
                count,
            },
        ),
        Commands::Reset => commands::reset(&settings),
    }
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}
