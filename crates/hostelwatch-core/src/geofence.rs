//! Geofence evaluation results.
//!
//! Distance and containment are computed by the backend; the tracker only
//! sends a position and receives a [`GeofenceResult`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::RemoteFailure;
use crate::error::{Result, WatchError};
use crate::position::PositionSample;
use crate::types::CheckLocationResponse;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude, -90..=90.
    pub latitude: f64,
    /// Longitude, -180..=180.
    pub longitude: f64,
}

impl Coordinates {
    /// Creates validated coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidCoordinates`] for non-finite or out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(WatchError::InvalidCoordinates(format!(
                "latitude must be between -90 and 90 (got {latitude})"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(WatchError::InvalidCoordinates(format!(
                "longitude must be between -180 and 180 (got {longitude})"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Parses coordinates from path segments such as `"21.49"` and `"83.90"`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidCoordinates`] if either value is not a number
    /// or is out of range.
    pub fn parse(latitude: &str, longitude: &str) -> Result<Self> {
        let lat = latitude.trim().parse::<f64>().map_err(|_| {
            WatchError::InvalidCoordinates(format!("latitude is not a number: '{latitude}'"))
        })?;
        let lon = longitude.trim().parse::<f64>().map_err(|_| {
            WatchError::InvalidCoordinates(format!("longitude is not a number: '{longitude}'"))
        })?;
        Self::new(lat, lon)
    }

    /// The `[lat, lon]` form used on the wire.
    #[must_use]
    pub const fn to_pair(self) -> [f64; 2] {
        [self.latitude, self.longitude]
    }
}

impl From<[f64; 2]> for Coordinates {
    fn from([latitude, longitude]: [f64; 2]) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Outcome of one completed geofence check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeofenceResult {
    /// Position that was checked.
    pub current_location: Coordinates,
    /// Hostel reference point.
    pub hostel_location: Coordinates,
    /// Distance between the two in meters.
    pub distance_meters: f64,
    /// Whether the position lies inside the geofence.
    pub is_in_hostel: bool,
}

impl TryFrom<CheckLocationResponse> for GeofenceResult {
    type Error = RemoteFailure;

    fn try_from(response: CheckLocationResponse) -> std::result::Result<Self, Self::Error> {
        match response {
            CheckLocationResponse::Success {
                current_location,
                hostel_location,
                distance,
                is_in_hostel,
            } => Ok(Self {
                current_location: current_location.into(),
                hostel_location: hostel_location.into(),
                distance_meters: distance,
                is_in_hostel,
            }),
            CheckLocationResponse::Error { message } => Err(RemoteFailure::Server(message)),
        }
    }
}

impl From<GeofenceResult> for CheckLocationResponse {
    fn from(result: GeofenceResult) -> Self {
        Self::Success {
            current_location: result.current_location.to_pair(),
            hostel_location: result.hostel_location.to_pair(),
            distance: result.distance_meters,
            is_in_hostel: result.is_in_hostel,
        }
    }
}

/// Classifies a position against the hostel geofence.
#[async_trait]
pub trait GeofenceClient: Send + Sync {
    /// Evaluates `sample` against the geofence.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteFailure`] when the check could not be completed.
    async fn check(
        &self,
        sample: &PositionSample,
    ) -> std::result::Result<GeofenceResult, RemoteFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_range_checks() {
        assert!(Coordinates::new(90.0, 180.0).is_ok());
        assert!(Coordinates::new(-90.0, -180.0).is_ok());
        assert!(Coordinates::new(90.1, 0.0).is_err());
        assert!(Coordinates::new(0.0, -180.5).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = Coordinates::parse("north", "77.6").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_COORDINATES");
        assert!(Coordinates::parse(" 12.9 ", "77.6").is_ok());
    }

    #[test]
    fn test_error_response_becomes_server_failure() {
        let response = CheckLocationResponse::Error {
            message: "bad input".into(),
        };
        assert_eq!(
            GeofenceResult::try_from(response),
            Err(RemoteFailure::Server("bad input".into()))
        );
    }

    #[test]
    fn test_success_response_maps_fields() {
        let response = CheckLocationResponse::Success {
            current_location: [12.9, 77.6],
            hostel_location: [12.9, 77.6],
            distance: 0.0,
            is_in_hostel: true,
        };
        let result = GeofenceResult::try_from(response).unwrap();
        assert!(result.is_in_hostel);
        assert!(result.distance_meters.abs() < f64::EPSILON);
        assert!((result.hostel_location.longitude - 77.6).abs() < f64::EPSILON);
    }
}
