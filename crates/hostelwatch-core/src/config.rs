//! Application configuration management.
//!
//! Configuration is read from an optional TOML file and then overridden by
//! environment variables of the form `HOSTELWATCH_<SECTION>__<KEY>`, e.g.
//! `HOSTELWATCH_TRACKER__POLL_INTERVAL_SECS=5`. Every field has a default, so
//! a missing file still yields a working configuration.
//!
//! ```toml
//! [tracker]
//! server_url = "http://127.0.0.1:3000"
//! device_id = "pixel-7"
//! poll_interval_secs = 10
//!
//! [sampler]
//! timeout_secs = 10
//! max_attempts = 3
//! retry_delay_secs = 2
//!
//! [position]
//! source = "command"
//! program = "gpspipe-fix"
//!
//! [server]
//! bind = "0.0.0.0:3000"
//! hostel_latitude = 21.498221
//! hostel_longitude = 83.904285
//! alert_radius_meters = 10.0
//! timezone = "Asia/Kolkata"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geofence::Coordinates;
use crate::storage::default_data_dir;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "HOSTELWATCH";

/// Longest accepted polling interval.
pub const MAX_POLL_INTERVAL_SECS: u64 = 3600;

/// Errors from loading, validating or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    /// The configuration could not be rendered as TOML.
    #[error("failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// The configuration file could not be written.
    #[error("failed to write {path}: {source}")]
    WriteError {
        /// Target path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A single invalid field.
    #[error("invalid {field}: {message}")]
    ValidationError {
        /// Dotted field path, e.g. `tracker.poll_interval_secs`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several invalid fields.
    #[error("{} configuration errors: {}", .0.len(), join_errors(.0))]
    MultipleValidationErrors(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A specialized result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device-side polling settings.
    pub tracker: TrackerConfig,

    /// Position sampling retry settings.
    pub sampler: SamplerConfig,

    /// Where positions come from.
    pub position: PositionConfig,

    /// Backend settings.
    pub server: ServerConfig,

    /// Persistent data location.
    pub storage: StorageConfig,
}

/// Device-side polling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Base URL of the backend.
    pub server_url: String,

    /// Identity sent to the backend; the backend falls back to the peer address.
    pub device_id: Option<String>,

    /// Seconds between polling cycles.
    pub poll_interval_secs: u64,

    /// Timeout for each backend request.
    pub request_timeout_secs: u64,

    /// Fetch attendance history after each successful cycle.
    pub refresh_history: bool,

    /// Local dedupe window for entry marks.
    pub mark_window_hours: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            device_id: None,
            poll_interval_secs: 10,
            request_timeout_secs: 15,
            refresh_history: true,
            mark_window_hours: crate::attendance::DEFAULT_MARK_WINDOW_HOURS,
        }
    }
}

impl TrackerConfig {
    /// The polling interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// The local dedupe window.
    #[must_use]
    pub fn mark_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.mark_window_hours)
    }
}

/// Position sampling retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Deadline for one position request.
    pub timeout_secs: u64,

    /// Attempts per tick when requests time out.
    pub max_attempts: u32,

    /// Pause between timed-out attempts.
    pub retry_delay_secs: u64,

    /// Request high-accuracy positioning.
    pub high_accuracy: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_attempts: 3,
            retry_delay_secs: 2,
            high_accuracy: true,
        }
    }
}

/// Where positions come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum PositionConfig {
    /// A fixed position.
    Static {
        /// Latitude in decimal degrees.
        latitude: f64,
        /// Longitude in decimal degrees.
        longitude: f64,
        /// Reported accuracy in meters.
        #[serde(default = "default_static_accuracy")]
        accuracy_meters: f64,
    },

    /// An external program printing `lat lon [accuracy]` on stdout.
    Command {
        /// Program to run.
        program: String,
        /// Arguments passed to it.
        #[serde(default)]
        args: Vec<String>,
    },
}

const fn default_static_accuracy() -> f64 {
    5.0
}

impl Default for PositionConfig {
    fn default() -> Self {
        let server = ServerConfig::default();
        Self::Static {
            latitude: server.hostel_latitude,
            longitude: server.hostel_longitude,
            accuracy_meters: default_static_accuracy(),
        }
    }
}

/// Backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: String,

    /// Latitude of the hostel reference point.
    pub hostel_latitude: f64,

    /// Longitude of the hostel reference point.
    pub hostel_longitude: f64,

    /// Distance from the reference point still counted as inside.
    pub alert_radius_meters: f64,

    /// Timezone deciding what "today" means for attendance.
    #[serde(with = "timezone_serde")]
    pub timezone: Tz,

    /// Production logging (rolling JSON files) instead of pretty stdout.
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            hostel_latitude: 21.498_221,
            hostel_longitude: 83.904_285,
            alert_radius_meters: 10.0,
            timezone: chrono_tz::UTC,
            production: false,
        }
    }
}

impl ServerConfig {
    /// The hostel reference point.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured coordinates are out of range.
    pub fn hostel_location(&self) -> crate::error::Result<Coordinates> {
        Coordinates::new(self.hostel_latitude, self.hostel_longitude)
    }

    /// The parsed listen address.
    ///
    /// # Errors
    ///
    /// Returns an error if `bind` is not a socket address.
    pub fn bind_addr(&self) -> ConfigResult<SocketAddr> {
        self.bind.parse().map_err(|e| ConfigError::ValidationError {
            field: "server.bind".into(),
            message: format!("'{}' is not a socket address: {e}", self.bind),
        })
    }
}

/// Persistent data location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory; the platform default when unset.
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// The configured data directory or the platform default.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

impl Config {
    /// Load configuration from `path` (if given) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed, or validation fails.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let config: Self = builder
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path` if it exists, else from defaults and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file is malformed or validation fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        Self::load(path.exists().then_some(path))
    }

    /// Write the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: parent.display().to_string(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::WriteError {
            path: path.display().to_string(),
            source,
        })
    }

    /// Check every field, reporting all violations at once.
    ///
    /// # Errors
    ///
    /// Returns the single violation, or [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let mut invalid = |field: &str, message: String| {
            errors.push(ConfigError::ValidationError {
                field: field.to_string(),
                message,
            });
        };

        if url::Url::parse(&self.tracker.server_url).is_err() {
            invalid(
                "tracker.server_url",
                format!("'{}' is not a valid URL", self.tracker.server_url),
            );
        }
        if !(1..=MAX_POLL_INTERVAL_SECS).contains(&self.tracker.poll_interval_secs) {
            invalid(
                "tracker.poll_interval_secs",
                format!("must be between 1 and {MAX_POLL_INTERVAL_SECS}"),
            );
        }
        if self.tracker.request_timeout_secs == 0 {
            invalid("tracker.request_timeout_secs", "must be positive".into());
        }
        if self.tracker.mark_window_hours <= 0 {
            invalid("tracker.mark_window_hours", "must be positive".into());
        }
        if self
            .tracker
            .device_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            invalid("tracker.device_id", "must not be blank".into());
        }

        if self.sampler.timeout_secs == 0 {
            invalid("sampler.timeout_secs", "must be positive".into());
        }
        if self.sampler.max_attempts == 0 {
            invalid("sampler.max_attempts", "must be at least 1".into());
        }

        match &self.position {
            PositionConfig::Static {
                latitude,
                longitude,
                accuracy_meters,
            } => {
                if let Err(e) = Coordinates::new(*latitude, *longitude) {
                    invalid("position", e.to_string());
                }
                if !accuracy_meters.is_finite() || *accuracy_meters < 0.0 {
                    invalid("position.accuracy_meters", "must be a non-negative number".into());
                }
            }
            PositionConfig::Command { program, .. } => {
                if program.trim().is_empty() {
                    invalid("position.program", "must not be empty".into());
                }
            }
        }

        if let Err(e) = self.server.hostel_location() {
            invalid("server.hostel_location", e.to_string());
        }
        if !self.server.alert_radius_meters.is_finite() || self.server.alert_radius_meters <= 0.0 {
            invalid("server.alert_radius_meters", "must be a positive number".into());
        }
        if let Err(ConfigError::ValidationError { message, .. }) = self.server.bind_addr() {
            invalid("server.bind", message);
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

mod timezone_serde {
    use chrono_tz::Tz;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(tz.name())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Tz, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
