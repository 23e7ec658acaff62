//! hostelwatch agent
//!
//! Runs on the resident's device. Every poll it samples the position, asks
//! the backend whether it is inside the hostel geofence, marks attendance on
//! entry, and raises an alert on exit.
//!
//! # Usage
//!
//! ```bash
//! hostelwatch-agent --config hostelwatch.toml --device-id pixel-7
//!
//! # Write a starting configuration with the overrides applied
//! hostelwatch-agent --config hostelwatch.toml --device-id pixel-7 --write-config
//! ```
//!
//! While running, commands are read from stdin: `interval <secs>`, `start`,
//! `stop`, `status`, `quit`. Status output goes to stdout and logs to stderr.
//!
//! # Environment Variables
//!
//! - `HOSTELWATCH_<SECTION>__<KEY>`: Override any configuration value
//! - `RUST_LOG` / `HOSTELWATCH_LOG_LEVEL`: Logging filter (default: info)

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod control;
mod source;
mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hostelwatch_core::logging::{self, LogOutput};
use hostelwatch_core::{
    AttendanceBackend, AttendanceSessionTracker, BackendClient, Config, Cycle, GeofenceClient,
    RetryPolicy, RetryingSampler, Scheduler, Storage,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::control::{Command, Controller};
use crate::terminal::TerminalSink;

/// Geofence presence tracker.
#[derive(Debug, Parser)]
#[command(name = "hostelwatch-agent", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "hostelwatch.toml")]
    config: PathBuf,

    /// Backend URL, overriding `tracker.server_url`.
    #[arg(long)]
    server_url: Option<String>,

    /// Device identity, overriding `tracker.device_id`.
    #[arg(long)]
    device_id: Option<String>,

    /// Polling interval in seconds, overriding `tracker.poll_interval_secs`.
    #[arg(short, long)]
    interval: Option<u64>,

    /// Write the effective configuration to `--config` and exit.
    #[arg(long)]
    write_config: bool,
}

impl Args {
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_or_default(&self.config)
            .with_context(|| format!("loading {}", self.config.display()))?;
        if let Some(url) = &self.server_url {
            config.tracker.server_url.clone_from(url);
        }
        if let Some(device_id) = &self.device_id {
            config.tracker.device_id = Some(device_id.clone());
        }
        if let Some(secs) = self.interval {
            config.tracker.poll_interval_secs = secs;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn save_config(&self, config: &Config) -> Result<()> {
        config
            .save(&self.config)
            .with_context(|| format!("writing {}", self.config.display()))?;
        info!(path = %self.config.display(), "configuration written");
        Ok(())
    }
}

fn build_cycle(config: &Config) -> Result<Cycle> {
    let client = Arc::new(BackendClient::from_config(&config.tracker)?);
    let sampler = RetryingSampler::new(
        source::from_config(&config.position),
        RetryPolicy::from(&config.sampler),
    );
    let storage = Storage::new(config.storage.data_dir());
    let tracker = AttendanceSessionTracker::with_storage(
        Arc::clone(&client) as Arc<dyn AttendanceBackend>,
        storage,
        config.tracker.mark_window(),
    )
    .context("loading mark state")?;

    Ok(Cycle::new(
        sampler,
        client as Arc<dyn GeofenceClient>,
        tracker,
        Box::new(TerminalSink::stdout()),
    )
    .with_history(config.tracker.refresh_history))
}

/// Signal a oneshot on SIGINT or SIGTERM.
fn setup_signal_handlers() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match (
                signal(SignalKind::interrupt()),
                signal(SignalKind::terminate()),
            ) {
                (Ok(mut sigint), Ok(mut sigterm)) => {
                    tokio::select! {
                        _ = sigint.recv() => info!("Received SIGINT, initiating shutdown..."),
                        _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown..."),
                    }
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "signal handlers unavailable, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, initiating shutdown...");
        }

        let _ = tx.send(());
    });

    rx
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(&LogOutput::Stderr)?;

    let args = Args::parse();
    let config = args.load_config()?;
    if args.write_config {
        return args.save_config(&config);
    }

    info!(
        server = %config.tracker.server_url,
        device_id = config.tracker.device_id.as_deref().unwrap_or("<peer address>"),
        interval_secs = config.tracker.poll_interval_secs,
        "hostelwatch agent starting"
    );

    let mut shutdown = setup_signal_handlers();
    let cycle = build_cycle(&config)?;
    let mut controller = Controller::new(Scheduler::new(cycle), config.tracker.poll_interval());
    println!("{}", controller.execute(Command::Start).await?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(command) => {
                        match controller.execute(command).await {
                            Ok(reply) => println!("{reply}"),
                            Err(e) => println!("Error: {e}"),
                        }
                        if command == Command::Quit {
                            break;
                        }
                    }
                    Err(e) => println!("{e}"),
                },
                Ok(None) => {
                    info!("stdin closed; polling continues until a shutdown signal");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read stdin; commands disabled");
                    stdin_open = false;
                }
            },
        }
    }

    info!("Cleaning up...");
    controller.shutdown().await.context("stopping polling loop")?;
    info!("hostelwatch agent stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_config_keeps_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostelwatch.toml");
        let args = Args::try_parse_from([
            "hostelwatch-agent",
            "--config",
            path.to_str().unwrap(),
            "--device-id",
            "pixel-7",
            "--interval",
            "30",
            "--write-config",
        ])
        .unwrap();
        assert!(args.write_config);

        let config = args.load_config().unwrap();
        args.save_config(&config).unwrap();

        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.tracker.device_id.as_deref(), Some("pixel-7"));
        assert_eq!(reloaded.tracker.poll_interval_secs, 30);
    }
}
