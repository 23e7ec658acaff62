//! Position sources available to the agent.
//!
//! Besides a fixed position, the agent can run an external program for every
//! sample. The program prints `lat lon [accuracy]` on its first output line
//! and exits 0. It is killed when the sampler's deadline expires.

use std::io::ErrorKind;
use std::process::Stdio;

use async_trait::async_trait;
use hostelwatch_core::{
    Coordinates, PositionConfig, PositionRequest, PositionSample, PositionSource, SensorFailure,
    StaticPositionSource,
};
use tokio::process::Command;
use tracing::debug;

/// Set in the program's environment when high accuracy was requested.
pub const HIGH_ACCURACY_ENV: &str = "HOSTELWATCH_HIGH_ACCURACY";

/// Accuracy reported when the program prints only two values.
pub const UNKNOWN_ACCURACY_METERS: f64 = 0.0;

/// Builds the configured position source.
pub fn from_config(config: &PositionConfig) -> Box<dyn PositionSource> {
    match config {
        PositionConfig::Static {
            latitude,
            longitude,
            accuracy_meters,
        } => Box::new(StaticPositionSource::new(
            *latitude,
            *longitude,
            *accuracy_meters,
        )),
        PositionConfig::Command { program, args } => {
            Box::new(CommandPositionSource::new(program.clone(), args.clone()))
        }
    }
}

/// Reads positions from an external program.
#[derive(Debug, Clone)]
pub struct CommandPositionSource {
    program: String,
    args: Vec<String>,
}

impl CommandPositionSource {
    /// Runs `program` with `args` for every sample.
    pub const fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

#[async_trait]
impl PositionSource for CommandPositionSource {
    async fn sample(&self, request: &PositionRequest) -> Result<PositionSample, SensorFailure> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if request.high_accuracy {
            command.env(HIGH_ACCURACY_ENV, "1");
        }

        let child = command.spawn().map_err(|e| spawn_failure(&self.program, &e))?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SensorFailure::Unknown(format!("waiting for {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim();
            return Err(SensorFailure::Unavailable(if detail.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                format!("{} exited with {}: {detail}", self.program, output.status)
            }));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (latitude, longitude, accuracy) = parse_fix(&stdout)?;
        debug!(program = %self.program, latitude, longitude, accuracy, "fix_read");
        Ok(PositionSample::now(latitude, longitude, accuracy))
    }
}

fn spawn_failure(program: &str, error: &std::io::Error) -> SensorFailure {
    match error.kind() {
        ErrorKind::PermissionDenied => SensorFailure::PermissionDenied,
        ErrorKind::NotFound => SensorFailure::Unavailable(format!("{program} not found")),
        _ => SensorFailure::Unknown(format!("failed to start {program}: {error}")),
    }
}

/// Parses `lat lon [accuracy]` from the first non-empty line.
/// Values may be separated by whitespace or commas.
fn parse_fix(output: &str) -> Result<(f64, f64, f64), SensorFailure> {
    let garbage =
        || SensorFailure::Unknown(format!("unreadable position output: {:?}", output.trim()));

    let line = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(garbage)?;
    let values = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| garbage())?;

    let (latitude, longitude, accuracy) = match values.as_slice() {
        [lat, lon] => (*lat, *lon, UNKNOWN_ACCURACY_METERS),
        [lat, lon, acc] if acc.is_finite() && *acc >= 0.0 => (*lat, *lon, *acc),
        _ => return Err(garbage()),
    };
    Coordinates::new(latitude, longitude).map_err(|e| SensorFailure::Unknown(e.to_string()))?;
    Ok((latitude, longitude, accuracy))
}
