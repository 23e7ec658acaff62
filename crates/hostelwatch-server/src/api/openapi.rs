//! OpenAPI specification for the hostelwatch API.

use axum::Json;
use hostelwatch_core::{
    AttendanceRecord, AttendanceStatus, CheckLocationResponse, HealthResponse, SessionResponse,
};
use utoipa::OpenApi;

use super::error::ErrorResponse;

/// Serve the OpenAPI specification as JSON at `/api/openapi.json`.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// The OpenAPI specification as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for hostelwatch.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "hostelwatch API",
        version = "0.1.0",
        description = r"
# hostelwatch API

Geofence checks and attendance sessions for hostel residents.

A device polls its position, asks `checkLocation` whether it is inside the
hostel geofence, and signals entries and exits. The server keeps one session
per presence interval and device; at most one entry is recorded per device
and day from the device's point of view.
",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local hostelwatch server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "geofence", description = "Distance and containment checks"),
        (name = "attendance", description = "Attendance sessions and history")
    ),
    paths(
        super::health::health_check,
        super::location::check_location,
        super::attendance::check_attendance_status,
        super::attendance::signal_entry,
        super::attendance::signal_exit,
        super::attendance::attendance_data,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            CheckLocationResponse,
            AttendanceStatus,
            AttendanceRecord,
            SessionResponse,
        )
    )
)]
pub struct ApiDoc;
