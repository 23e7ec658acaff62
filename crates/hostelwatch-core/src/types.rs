//! Wire types shared by the tracker and the backend.
//!
//! These are the JSON bodies exchanged over HTTP. Domain types built from
//! them live in their respective modules ([`geofence`](crate::geofence),
//! [`attendance`](crate::attendance)).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Response of the check-location endpoint.
///
/// Tagged by `status`: `"success"` carries the geofence evaluation,
/// `"error"` carries a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CheckLocationResponse {
    /// The position was evaluated against the hostel geofence.
    Success {
        /// Position that was checked, as `[lat, lon]`.
        #[schema(value_type = Vec<f64>, example = json!([21.498_2, 83.904_3]))]
        current_location: [f64; 2],
        /// Hostel reference point, as `[lat, lon]`.
        #[schema(value_type = Vec<f64>, example = json!([21.498_221, 83.904_285]))]
        hostel_location: [f64; 2],
        /// Geodesic distance between the two points in meters.
        #[schema(example = 4.73)]
        distance: f64,
        /// Whether the distance is within the alert radius.
        #[schema(example = true)]
        is_in_hostel: bool,
    },
    /// The request could not be evaluated.
    Error {
        /// Human-readable reason.
        #[schema(example = "latitude must be between -90 and 90")]
        message: String,
    },
}

/// Whether the caller already has an attendance entry for today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceStatus {
    /// `true` once any session was opened today (backend timezone).
    #[serde(rename = "markedToday")]
    pub marked_today: bool,
}

/// One contiguous interval of presence inside the geofence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "01928f3e-7c1a-7b3e-9d2f-3a4b5c6d7e8f",
    "user_id": "pixel-7",
    "entry_time": "2025-01-15T18:30:00Z",
    "exit_time": null,
    "duration": null
}))]
pub struct AttendanceRecord {
    /// Record identifier.
    pub id: Uuid,

    /// Device the session belongs to.
    #[schema(example = "pixel-7")]
    pub user_id: String,

    /// When the device entered the geofence.
    pub entry_time: DateTime<Utc>,

    /// When the device left; absent while the session is open.
    pub exit_time: Option<DateTime<Utc>>,

    /// Whole seconds between entry and exit; absent while open.
    pub duration: Option<i64>,
}

impl AttendanceRecord {
    /// Returns `true` while the session has no exit recorded.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }
}

/// Body returned by the entry/exit signalling endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    /// `true` when this call changed the ledger (opened or closed a session).
    pub changed: bool,

    /// The affected session, if any.
    pub session: Option<AttendanceRecord>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    #[schema(example = "ok")]
    pub status: String,

    /// Service version.
    #[schema(example = "0.1.0")]
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_location_success_shape() {
        let json = r#"{
            "status": "success",
            "current_location": [12.9, 77.6],
            "hostel_location": [12.9, 77.6],
            "distance": 0.0,
            "is_in_hostel": true
        }"#;
        let parsed: CheckLocationResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            parsed,
            CheckLocationResponse::Success {
                is_in_hostel: true,
                ..
            }
        ));
    }

    #[test]
    fn test_check_location_error_shape() {
        let json = r#"{"status": "error", "message": "could not convert string to float"}"#;
        let parsed: CheckLocationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed,
            CheckLocationResponse::Error {
                message: "could not convert string to float".into()
            }
        );
    }

    #[test]
    fn test_attendance_status_uses_camel_case() {
        let json = serde_json::to_string(&AttendanceStatus { marked_today: true }).unwrap();
        assert_eq!(json, r#"{"markedToday":true}"#);
    }

    #[test]
    fn test_open_record_serializes_nulls() {
        let record = AttendanceRecord {
            id: Uuid::nil(),
            user_id: "dev".into(),
            entry_time: Utc::now(),
            exit_time: None,
            duration: None,
        };
        assert!(record.is_open());
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"exit_time\":null"));
        assert!(json.contains("\"duration\":null"));
    }
}
