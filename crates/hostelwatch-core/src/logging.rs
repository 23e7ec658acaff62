//! Subscriber setup for the hostelwatch binaries.
//!
//! The filter comes from `RUST_LOG`, then `HOSTELWATCH_LOG_LEVEL`, then `info`.
//!
//! - [`LogOutput::Service`]: JSON to a daily rolling file plus compact stdout
//! - [`LogOutput::Development`]: pretty stdout with span events
//! - [`LogOutput::Stderr`]: compact stderr, leaving stdout to the status display

use std::path::PathBuf;
use std::sync::OnceLock;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Fallback filter variable when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "HOSTELWATCH_LOG_LEVEL";

const LOG_FILE_PREFIX: &str = "hostelwatch";

static GUARDS: OnceLock<(WorkerGuard, WorkerGuard)> = OnceLock::new();

/// Where log events go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// JSON to a daily rolling file in `dir`, plus uncoloured compact stdout
    /// for the journal.
    Service {
        /// Directory holding the rolling files.
        dir: PathBuf,
    },

    /// Pretty stdout with span open/close events.
    Development,

    /// Compact stderr.
    Stderr,
}

impl LogOutput {
    /// The server's output: [`LogOutput::Service`] in the default log
    /// directory when `production`, otherwise [`LogOutput::Development`].
    #[must_use]
    pub fn for_server(production: bool) -> Self {
        if production {
            Self::Service {
                dir: default_log_dir(),
            }
        } else {
            Self::Development
        }
    }
}

/// Errors from installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The filter directive did not parse.
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    /// The log directory could not be created.
    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDir {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A global subscriber is already installed.
    #[error("logging already initialised: {0}")]
    Install(#[from] TryInitError),
}

/// Installs the global subscriber for `output`.
///
/// # Errors
///
/// Returns an error if the filter is invalid, the log directory cannot be
/// created, or a subscriber is already installed.
pub fn init(output: &LogOutput) -> Result<(), LoggingError> {
    let filter = env_filter()?;

    match output {
        LogOutput::Service { dir } => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
                path: dir.clone(),
                source,
            })?;

            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            let (file, file_guard) = tracing_appender::non_blocking(appender);
            let (stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(file)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_writer(stdout)
                        .with_ansi(false),
                )
                .try_init()?;

            let _ = GUARDS.set((file_guard, stdout_guard));
        }
        LogOutput::Development => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_file(true)
                        .with_line_number(true)
                        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE),
                )
                .try_init()?;
        }
        LogOutput::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
    }

    Ok(())
}

fn env_filter() -> Result<EnvFilter, ParseError> {
    EnvFilter::try_from_default_env().or_else(|_| {
        let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(level)
    })
}

/// `/var/log/hostelwatch` on Linux, the platform data directory elsewhere.
#[must_use]
pub fn default_log_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/hostelwatch")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "hostelwatch")
            .map_or_else(|| PathBuf::from("./logs"), |dirs| dirs.data_dir().join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_output_follows_production_flag() {
        assert_eq!(LogOutput::for_server(false), LogOutput::Development);
        assert_eq!(
            LogOutput::for_server(true),
            LogOutput::Service {
                dir: default_log_dir()
            }
        );
    }

    #[test]
    fn test_default_log_dir_names_the_app() {
        let dir = default_log_dir();
        assert!(dir.to_string_lossy().contains("hostelwatch") || dir.ends_with("logs"));
    }

    #[test]
    fn test_second_install_is_rejected() {
        init(&LogOutput::Stderr).unwrap();
        assert!(matches!(
            init(&LogOutput::Stderr),
            Err(LoggingError::Install(_))
        ));
    }
}
