//! Runtime control of the polling loop from text commands.
//!
//! ```text
//! interval <secs>   restart polling with a new interval
//! stop              stop polling
//! start             resume polling with the last interval
//! status            show running state, interval and containment
//! quit              stop and exit
//! ```

use std::str::FromStr;
use std::time::Duration;

use hostelwatch_core::config::MAX_POLL_INTERVAL_SECS;
use hostelwatch_core::{Scheduler, SchedulerError};
use thiserror::Error;
use tracing::info;

/// A parsed control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Interval(Duration),
    Start,
    Stop,
    Status,
    Help,
    Quit,
}

/// Why a command line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("usage: interval <seconds>")]
    MissingInterval,

    #[error(
        "interval must be a whole number of seconds between 1 and {max}, got '{0}'",
        max = MAX_POLL_INTERVAL_SECS
    )]
    InvalidInterval(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(Self::Status);
        };

        match verb.to_ascii_lowercase().as_str() {
            "interval" => {
                let raw = words.next().ok_or(CommandError::MissingInterval)?;
                let secs = raw
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| (1..=MAX_POLL_INTERVAL_SECS).contains(secs))
                    .ok_or_else(|| CommandError::InvalidInterval(raw.to_string()))?;
                Ok(Self::Interval(Duration::from_secs(secs)))
            }
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "status" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Owns the scheduler and remembers the interval to resume with.
pub struct Controller {
    scheduler: Scheduler,
    interval: Duration,
}

impl Controller {
    /// Wraps a stopped scheduler; `interval` is used by the first `start`.
    pub const fn new(scheduler: Scheduler, interval: Duration) -> Self {
        Self {
            scheduler,
            interval,
        }
    }

    /// Executes `command` and returns the text to show.
    ///
    /// `Quit` only stops polling; the caller ends the session.
    pub async fn execute(&mut self, command: Command) -> Result<String, SchedulerError> {
        match command {
            Command::Interval(interval) => {
                self.interval = interval;
                if self.scheduler.is_running() {
                    self.scheduler.restart(interval).await?;
                    info!(interval_secs = interval.as_secs(), "interval_changed");
                    Ok(format!("Polling every {}s.", interval.as_secs()))
                } else {
                    Ok(format!(
                        "Interval set to {}s; 'start' to resume.",
                        interval.as_secs()
                    ))
                }
            }
            Command::Start => {
                if self.scheduler.is_running() {
                    return Ok("Already polling.".to_string());
                }
                self.scheduler.start(self.interval)?;
                Ok(format!("Polling every {}s.", self.interval.as_secs()))
            }
            Command::Stop | Command::Quit => {
                self.scheduler.stop().await?;
                Ok("Polling stopped.".to_string())
            }
            Command::Status => Ok(self.status()),
            Command::Help => Ok(HELP.to_string()),
        }
    }

    /// One-line summary of the loop.
    pub fn status(&self) -> String {
        let containment = self.scheduler.containment();
        match self.scheduler.interval() {
            Some(interval) => format!("polling every {}s, {containment}", interval.as_secs()),
            None => format!(
                "stopped (interval {}s), {containment}",
                self.interval.as_secs()
            ),
        }
    }

    /// Stops polling for good.
    pub async fn shutdown(self) -> Result<(), SchedulerError> {
        self.scheduler.into_cycle().await.map(drop)
    }
}

const HELP: &str = "commands: interval <secs> | start | stop | status | quit";
