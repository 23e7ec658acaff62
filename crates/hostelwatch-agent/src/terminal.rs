//! Terminal rendering of cycle reports.

use std::fmt;
use std::io::{self, Write};

use chrono::{DateTime, Local, Utc};
use hostelwatch_core::presentation::{
    format_coordinates, format_distance, format_duration, remote_failure_message,
};
use hostelwatch_core::{
    AttendanceRecord, CycleOutcome, CycleReport, PresentationSink, TrackOutcome, Transition,
};
use tracing::warn;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes human-readable reports to a terminal or any writer.
///
/// A failure message is shown once until it changes or a cycle succeeds.
/// The history table is printed only when its contents change.
pub struct TerminalSink<W> {
    out: W,
    shown_failure: Option<String>,
    shown_history: Option<Vec<AttendanceRecord>>,
}

impl TerminalSink<io::Stdout> {
    /// A sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalSink<W> {
    /// A sink writing to `out`.
    pub const fn new(out: W) -> Self {
        Self {
            out,
            shown_failure: None,
            shown_history: None,
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{args}").and_then(|()| self.out.flush()) {
            warn!(error = %e, "terminal_write_failed");
        }
    }
}

impl<W: Write + Send> PresentationSink for TerminalSink<W> {
    fn report(&mut self, report: &CycleReport) {
        let stamp = local_time(report.completed_at);

        let CycleOutcome::Located {
            result,
            transition,
            attendance,
            ..
        } = &report.outcome
        else {
            let message = report.failure_message().unwrap_or_default();
            if self.shown_failure.as_deref() != Some(message.as_str()) {
                self.line(format_args!("[#{} {stamp}] {message}", report.sequence));
                self.shown_failure = Some(message);
            }
            return;
        };

        if self.shown_failure.take().is_some() {
            self.line(format_args!("[#{} {stamp}] Location restored.", report.sequence));
        }

        self.line(format_args!(
            "[#{} {stamp}] {}  you: {}  hostel: {}  distance: {}",
            report.sequence,
            report.containment,
            format_coordinates(result.current_location),
            format_coordinates(result.hostel_location),
            format_distance(result.distance_meters),
        ));
        match transition {
            Transition::Entered => self.line(format_args!("Entered the hostel.")),
            Transition::Exited => self.line(format_args!("Left the hostel.")),
            Transition::Unchanged => {}
        }
        if let Some(message) = attendance_message(attendance) {
            self.line(format_args!("{message}"));
        }
        if let Some(alert) = report.alert_message() {
            self.line(format_args!("ALERT: {alert}"));
        }
    }

    fn history(&mut self, records: &[AttendanceRecord]) {
        if self.shown_history.as_deref() == Some(records) {
            return;
        }

        self.line(format_args!("Attendance history"));
        if records.is_empty() {
            self.line(format_args!("  (no records)"));
        } else {
            self.line(format_args!("  {:<19}  {:<19}  Duration", "Entry", "Exit"));
            for record in records {
                let exit = record
                    .exit_time
                    .map_or_else(|| "-".to_string(), local_time);
                self.line(format_args!(
                    "  {:<19}  {:<19}  {}",
                    local_time(record.entry_time),
                    exit,
                    format_duration(record.duration),
                ));
            }
        }
        self.shown_history = Some(records.to_vec());
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

fn attendance_message(outcome: &TrackOutcome) -> Option<String> {
    match outcome {
        TrackOutcome::Idle | TrackOutcome::SuppressedLocally { .. } => None,
        TrackOutcome::Marked => Some("Attendance marked for today.".to_string()),
        TrackOutcome::AlreadyMarked => Some("Attendance already marked today.".to_string()),
        TrackOutcome::ExitSignalled => Some("Exit recorded.".to_string()),
        TrackOutcome::StatusCheckFailed(failure)
        | TrackOutcome::EntrySignalFailed(failure)
        | TrackOutcome::ExitSignalFailed(failure) => Some(format!(
            "Attendance update failed. {}",
            remote_failure_message(failure)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostelwatch_core::{ContainmentState, Coordinates, GeofenceResult, SensorFailure};

    fn record(entry: &str, exit: Option<&str>, duration: Option<i64>) -> AttendanceRecord {
        AttendanceRecord {
            id: uuid::Uuid::now_v7(),
            user_id: "pixel".into(),
            entry_time: entry.parse().unwrap(),
            exit_time: exit.map(|t| t.parse().unwrap()),
            duration,
        }
    }

    fn located(sequence: u64, inside: bool, transition: Transition) -> CycleReport {
        CycleReport {
            sequence,
            completed_at: Utc::now(),
            containment: if inside {
                ContainmentState::Inside
            } else {
                ContainmentState::Outside
            },
            outcome: CycleOutcome::Located {
                result: GeofenceResult {
                    current_location: Coordinates::from([21.5, 83.9]),
                    hostel_location: Coordinates::from([21.498_221, 83.904_285]),
                    distance_meters: if inside { 3.0 } else { 512.5 },
                    is_in_hostel: inside,
                },
                transition,
                alert: transition == Transition::Exited,
                attendance: match transition {
                    Transition::Entered => TrackOutcome::Marked,
                    Transition::Exited => TrackOutcome::ExitSignalled,
                    Transition::Unchanged => TrackOutcome::Idle,
                },
            },
        }
    }

    fn failed(sequence: u64, failure: SensorFailure) -> CycleReport {
        CycleReport {
            sequence,
            completed_at: Utc::now(),
            containment: ContainmentState::Inside,
            outcome: CycleOutcome::SensorFailed(failure),
        }
    }

    fn render(feed: impl FnOnce(&mut TerminalSink<Vec<u8>>)) -> String {
        let mut sink = TerminalSink::new(Vec::new());
        feed(&mut sink);
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn test_exit_shows_alert_once() {
        let out = render(|sink| {
            sink.report(&located(1, true, Transition::Entered));
            sink.report(&located(2, false, Transition::Exited));
            sink.report(&located(3, false, Transition::Unchanged));
        });

        assert!(out.contains("Entered the hostel."));
        assert!(out.contains("Attendance marked for today."));
        assert!(out.contains("distance: 512.50 meters"));
        assert!(out.contains("hostel: 21.498221, 83.904285"));
        assert_eq!(out.matches("ALERT: You're 512.50 meters away from hostel!").count(), 1);
    }

    #[test]
    fn test_repeated_failure_is_shown_once_and_cleared_on_success() {
        let out = render(|sink| {
            sink.report(&failed(1, SensorFailure::Timeout));
            sink.report(&failed(2, SensorFailure::Timeout));
            sink.report(&failed(3, SensorFailure::PermissionDenied));
            sink.report(&located(4, true, Transition::Unchanged));
            sink.report(&failed(5, SensorFailure::Timeout));
        });

        assert_eq!(out.matches("The request to get location timed out.").count(), 2);
        assert_eq!(out.matches("You denied the request for geolocation.").count(), 1);
        assert_eq!(out.matches("Location restored.").count(), 1);
    }

    #[test]
    fn test_history_table() {
        let records = vec![
            record("2025-01-15T08:00:00Z", None, None),
            record(
                "2025-01-14T08:00:00Z",
                Some("2025-01-14T09:30:00Z"),
                Some(5400),
            ),
        ];
        let out = render(|sink| {
            sink.history(&records);
            sink.history(&records);
        });

        assert_eq!(out.matches("Attendance history").count(), 1);
        assert!(out.contains("Still inside"));
        assert!(out.contains("1h 30m"));
        let open_row = out.lines().find(|l| l.contains("Still inside")).unwrap();
        assert!(open_row.contains("  -  "));
    }

    #[test]
    fn test_empty_history() {
        let out = render(|sink| sink.history(&[]));
        assert!(out.contains("(no records)"));
    }

    #[test]
    fn test_attendance_failures_are_explained() {
        let message = attendance_message(&TrackOutcome::EntrySignalFailed(
            hostelwatch_core::RemoteFailure::Network("refused".into()),
        ))
        .unwrap();
        assert!(message.starts_with("Attendance update failed."));
        assert!(message.contains("refused"));
        assert!(attendance_message(&TrackOutcome::Idle).is_none());
    }
}
