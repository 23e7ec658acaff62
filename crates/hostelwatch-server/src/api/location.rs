//! Geofence check endpoint.
//!
//! The device sends its raw coordinates in the path; the server measures the
//! distance to the hostel and decides containment against the alert radius.
//! Every check also keeps the caller's session in step: an inside check opens
//! one when none is open, an outside check closes the open one.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use hostelwatch_core::{CheckLocationResponse, Coordinates, GeofenceResult};
use tracing::{debug, error, warn};

use crate::api::attendance::DeviceId;
use crate::geo::distance_meters;
use crate::state::SharedState;

/// Check whether a position is inside the hostel geofence.
///
/// Invalid coordinates are reported in the body as `status: "error"` rather
/// than with an HTTP error status.
#[utoipa::path(
    get,
    path = "/check_location/{lat}/{lon}",
    tag = "geofence",
    operation_id = "checkLocation",
    summary = "Check a position against the hostel geofence",
    description = "Returns the distance in meters from the hostel reference point and whether \
        the position lies within the alert radius. An inside result opens a session for the \
        calling device when none is open; an outside result closes the open one.",
    params(
        ("x-device-id" = Option<String>, Header, description = "Device identity; defaults to the peer IP"),
        ("lat" = String, Path, description = "Latitude in decimal degrees", example = "21.498221"),
        ("lon" = String, Path, description = "Longitude in decimal degrees", example = "83.904285")
    ),
    responses(
        (status = 200, description = "Evaluation or error status", body = CheckLocationResponse)
    )
)]
pub async fn check_location(
    State(state): State<SharedState>,
    DeviceId(device): DeviceId,
    Path((lat, lon)): Path<(String, String)>,
) -> Json<CheckLocationResponse> {
    let current = match Coordinates::parse(&lat, &lon) {
        Ok(coordinates) => coordinates,
        Err(e) => {
            warn!(lat, lon, error = %e, "check_location_rejected");
            return Json(CheckLocationResponse::Error {
                message: e.to_string(),
            });
        }
    };

    let hostel = state.hostel();
    let distance = distance_meters(current, hostel);
    let result = GeofenceResult {
        current_location: current,
        hostel_location: hostel,
        distance_meters: distance,
        is_in_hostel: distance <= state.config().alert_radius_meters,
    };
    debug!(
        lat = current.latitude,
        lon = current.longitude,
        distance_m = distance,
        inside = result.is_in_hostel,
        "location_checked"
    );

    let now = Utc::now();
    let inside = result.is_in_hostel;
    let synced = state
        .update_ledger(|ledger| {
            let changed = if inside {
                ledger.open(&device, now).1
            } else {
                ledger.close(&device, now).is_some()
            };
            ((), changed)
        })
        .await;
    // The geofence answer stands even when the ledger cannot be saved.
    if let Err(e) = synced {
        error!(device = %device, error = %e, "session_sync_failed");
    }

    Json(result.into())
}
