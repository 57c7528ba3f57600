//! Subcommand implementations

use anyhow::{bail, Context, Result};
use colored::Colorize;
use iobeam_embedded::{Session, SessionConfig, Timeval, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::clock::HostClock;
use crate::config::Settings;
use crate::net::TcpConnector;
use crate::storage::DirStorage;

type HostSession<'a> = Session<'a, TcpConnector, DirStorage, HostClock>;

/// Options for the `run` loop
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub key: String,
    pub source: PathBuf,
    pub interval_secs: u64,
    pub scale: f64,
    pub count: u64,
}

fn open_session(settings: &Settings) -> Result<HostSession<'_>> {
    let config = SessionConfig::new(settings.project_id, &settings.project_token)
        .with_host(&settings.host)
        .with_port(settings.port);
    Session::new(
        config,
        TcpConnector::new(settings.connect_timeout, settings.read_timeout),
        DirStorage::new(&settings.state_dir),
        HostClock::new(),
        None,
    )
    .context("Failed to start session")
}

/// Integers stay integers; a '.' or exponent makes a float
pub fn parse_value(text: &str) -> Result<Value> {
    let text = text.trim();
    if text.contains(['.', 'e', 'E']) {
        let v: f64 = text
            .parse()
            .with_context(|| format!("Not a number: {:?}", text))?;
        if !v.is_finite() {
            bail!("Not a finite number: {:?}", text);
        }
        Ok(Value::Float(v))
    } else {
        let v: i64 = text
            .parse()
            .with_context(|| format!("Not an integer: {:?}", text))?;
        Ok(Value::Int(v))
    }
}

fn print_offset(offset: Timeval) {
    println!(
        "{} Clock offset {}.{:03}s",
        "iobeam".cyan().bold(),
        offset.sec,
        offset.msec
    );
}

pub fn register(settings: &Settings) -> Result<()> {
    let mut session = open_session(settings)?;
    let was_registered = session.is_registered();
    session
        .register_device()
        .context("Device registration failed")?;

    let id = session.device_id().unwrap_or_default();
    if was_registered {
        println!("{} Already registered as {}", "iobeam".cyan().bold(), id.green());
    } else {
        println!("{} Registered as {}", "iobeam".cyan().bold(), id.green());
    }
    session.finish();
    Ok(())
}

pub fn sync(settings: &Settings) -> Result<()> {
    let mut session = open_session(settings)?;
    session.start_time_keeping().context("Time sync failed")?;
    if let Some(offset) = session.clock_offset() {
        print_offset(offset);
    }
    println!(
        "{} Server time now {} ms",
        "iobeam".cyan().bold(),
        session.now().as_millis()
    );
    session.finish();
    Ok(())
}

pub fn send(settings: &Settings, key: &str, value: &str, time: Option<u64>) -> Result<()> {
    let value = parse_value(value)?;
    let mut session = open_session(settings)?;
    session
        .register_device()
        .context("Device registration failed")?;

    let sent = match time {
        Some(ms) => session.send_with_time(key, value, Timeval::from_millis(ms)),
        None => {
            session.start_time_keeping().context("Time sync failed")?;
            session.send(key, value)
        }
    };
    sent.with_context(|| format!("Failed to send {}", key))?;

    println!(
        "{} Sent {} = {}",
        "iobeam".cyan().bold(),
        key.yellow(),
        value
    );
    session.finish();
    Ok(())
}

fn read_source(options: &RunOptions) -> Result<Value> {
    let text = std::fs::read_to_string(&options.source)
        .with_context(|| format!("Failed to read {}", options.source.display()))?;
    let value = parse_value(&text)?;
    if options.scale == 1.0 {
        return Ok(value);
    }
    let raw = match value {
        Value::Int(i) => i as f64,
        Value::Float(f) => f,
    };
    Ok(Value::Float(raw * options.scale))
}

/// One measurement cycle: make sure the session is registered and synced,
/// then upload a reading. Anything that fails is retried next cycle.
fn cycle(session: &mut HostSession<'_>, options: &RunOptions) -> Result<()> {
    if !session.is_registered() {
        session
            .register_device()
            .context("Device registration failed")?;
    }
    if session.clock_offset().is_none() {
        session.start_time_keeping().context("Time sync failed")?;
    }
    let value = read_source(options)?;
    session
        .send(&options.key, value)
        .with_context(|| format!("Failed to send {}", options.key))?;
    info!("Sent {}={}", options.key, value);
    Ok(())
}

pub fn run(settings: &Settings, options: &RunOptions) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("Failed to install Ctrl+C handler")?;

    let mut session = open_session(settings)?;
    let interval = Duration::from_secs(options.interval_secs.max(1));
    println!(
        "{} Uploading {} from {} every {}s",
        "iobeam".cyan().bold(),
        options.key.yellow(),
        options.source.display(),
        interval.as_secs()
    );

    let mut sent = 0u64;
    while !stop.load(Ordering::SeqCst) {
        let started = Instant::now();
        match cycle(&mut session, options) {
            Ok(()) => {
                sent += 1;
                println!("{} {} uploads", "✓".green(), sent);
                if options.count > 0 && sent >= options.count {
                    break;
                }
            }
            Err(e) => {
                warn!("Cycle failed: {:#}", e);
                println!("{} {:#}", "✗".red(), e);
            }
        }

        while !stop.load(Ordering::SeqCst) && started.elapsed() < interval {
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    println!("{}", "Stopped".yellow());
    session.finish();
    Ok(())
}

pub fn reset(settings: &Settings) -> Result<()> {
    let mut session = open_session(settings)?;
    session
        .reset_identity()
        .context("Failed to delete identity record")?;
    let (_, storage, _) = session.finish();
    println!(
        "{} Identity removed from {}",
        "iobeam".cyan().bold(),
        storage.root().display()
    );
    Ok(())
}
