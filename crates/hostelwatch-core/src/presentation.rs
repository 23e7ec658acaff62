//! What the polling loop hands to the presentation layer.
//!
//! Each cycle produces one [`CycleReport`] that a [`PresentationSink`] renders.
//! Failure messages are keyed by failure kind; a successful cycle replaces any
//! failure shown before it.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::attendance::TrackOutcome;
use crate::client::RemoteFailure;
use crate::geofence::{Coordinates, GeofenceResult};
use crate::position::SensorFailure;
use crate::presence::{ContainmentState, Transition};
use crate::types::AttendanceRecord;

/// How one cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The position was sampled and classified.
    Located {
        /// The geofence evaluation.
        result: GeofenceResult,
        /// Transition computed from it.
        transition: Transition,
        /// Whether the outside alert fires for this cycle.
        alert: bool,
        /// What the attendance tracker did.
        attendance: TrackOutcome,
    },

    /// Sampling failed terminally.
    SensorFailed(SensorFailure),

    /// The geofence check failed.
    GeofenceFailed(RemoteFailure),
}

/// Everything the presentation layer needs about one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// 1-based cycle counter since the loop was built.
    pub sequence: u64,

    /// When the cycle finished.
    pub completed_at: DateTime<Utc>,

    /// Containment after this cycle.
    pub containment: ContainmentState,

    /// The cycle's outcome.
    pub outcome: CycleOutcome,
}

impl CycleReport {
    /// Returns `true` when the cycle ended in a terminal failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !matches!(self.outcome, CycleOutcome::Located { .. })
    }

    /// The transition computed this cycle, if the cycle got that far.
    #[must_use]
    pub const fn transition(&self) -> Option<Transition> {
        match &self.outcome {
            CycleOutcome::Located { transition, .. } => Some(*transition),
            _ => None,
        }
    }

    /// The failure message to display, if the cycle failed.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        match &self.outcome {
            CycleOutcome::Located { .. } => None,
            CycleOutcome::SensorFailed(failure) => Some(sensor_failure_message(failure).into()),
            CycleOutcome::GeofenceFailed(failure) => Some(remote_failure_message(failure)),
        }
    }

    /// The outside alert text, if it fires this cycle.
    #[must_use]
    pub fn alert_message(&self) -> Option<String> {
        match &self.outcome {
            CycleOutcome::Located {
                result,
                alert: true,
                ..
            } => Some(outside_alert(result.distance_meters)),
            _ => None,
        }
    }
}

/// Renders cycle reports and attendance history.
pub trait PresentationSink: Send {
    /// Called once per completed cycle, in cycle order.
    fn report(&mut self, report: &CycleReport);

    /// Called with the latest attendance history after a successful cycle.
    fn history(&mut self, _records: &[AttendanceRecord]) {}
}

/// A sink that only writes structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl PresentationSink for LogSink {
    fn report(&mut self, report: &CycleReport) {
        match &report.outcome {
            CycleOutcome::Located {
                result,
                transition,
                alert,
                ..
            } => info!(
                sequence = report.sequence,
                state = %report.containment,
                transition = ?transition,
                distance_m = result.distance_meters,
                alert,
                "cycle_report"
            ),
            _ => warn!(
                sequence = report.sequence,
                state = %report.containment,
                message = %report.failure_message().unwrap_or_default(),
                "cycle_report"
            ),
        }
    }

    fn history(&mut self, records: &[AttendanceRecord]) {
        info!(records = records.len(), "attendance_history");
    }
}

/// Display text for a sensor failure.
#[must_use]
pub const fn sensor_failure_message(failure: &SensorFailure) -> &'static str {
    match failure {
        SensorFailure::PermissionDenied => "You denied the request for geolocation.",
        SensorFailure::Unavailable(_) => "Location information is unavailable.",
        SensorFailure::Timeout => "The request to get location timed out.",
        SensorFailure::Unknown(_) => "An unknown error occurred.",
    }
}

/// Display text for a backend failure.
#[must_use]
pub fn remote_failure_message(failure: &RemoteFailure) -> String {
    match failure {
        RemoteFailure::Network(detail) => format!("Error: could not reach the server ({detail})"),
        RemoteFailure::Server(detail) => format!("Error: {detail}"),
    }
}

/// Text of the alert raised when the device leaves the geofence.
#[must_use]
pub fn outside_alert(distance_meters: f64) -> String {
    format!("You're {distance_meters:.2} meters away from hostel!")
}

/// `lat, lon` with six decimals.
#[must_use]
pub fn format_coordinates(coordinates: Coordinates) -> String {
    format!("{:.6}, {:.6}", coordinates.latitude, coordinates.longitude)
}

/// Distance in meters with two decimals.
#[must_use]
pub fn format_distance(distance_meters: f64) -> String {
    format!("{distance_meters:.2} meters")
}

/// Session duration as `"{h}h {m}m"`, or `"Still inside"` while open.
#[must_use]
pub fn format_duration(duration_secs: Option<i64>) -> String {
    match duration_secs {
        Some(secs) if secs > 0 => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
        _ => "Still inside".to_string(),
    }
}
