//! HTTP API routes and handlers.
//!
//! - `location` - Geofence distance and containment check
//! - `attendance` - Attendance status, entry/exit signalling, and history
//! - `health` - Service health checks
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod attendance;
pub mod error;
pub mod health;
pub mod location;
pub mod openapi;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                      - Health check
/// /check_location/{lat}/{lon}  - Geofence check
/// /check_attendance_status     - Whether the caller is marked today
/// /attendance/entry            - Open or confirm a session (POST)
/// /attendance/exit             - Close the open session (POST)
/// /attendance_data             - All sessions, newest first
/// /api/openapi.json            - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/check_location/{lat}/{lon}", get(location::check_location))
        .route(
            "/check_attendance_status",
            get(attendance::check_attendance_status),
        )
        .route("/attendance/entry", post(attendance::signal_entry))
        .route("/attendance/exit", post(attendance::signal_exit))
        .route("/attendance_data", get(attendance::attendance_data))
        .route("/api/openapi.json", get(openapi::get_openapi_spec))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use hostelwatch_core::{
        AttendanceRecord, AttendanceStatus, CheckLocationResponse, ServerConfig, SessionResponse,
        DEVICE_ID_HEADER,
    };
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    use super::*;
    use crate::state::AppState;

    fn router() -> Router {
        let config = ServerConfig {
            hostel_latitude: 12.9,
            hostel_longitude: 77.6,
            ..ServerConfig::default()
        };
        create_router(Arc::new(AppState::in_memory(config).unwrap()))
    }

    async fn call<T: DeserializeOwned>(
        app: &Router,
        method: Method,
        uri: &str,
        device: Option<&str>,
    ) -> (StatusCode, T) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(device) = device {
            request = request.header(DEVICE_ID_HEADER, device);
        }
        let response = app
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body): (_, serde_json::Value) =
            call(&router(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_check_location_at_hostel() {
        let (status, body): (_, CheckLocationResponse) =
            call(&router(), Method::GET, "/check_location/12.9/77.6", None).await;
        assert_eq!(status, StatusCode::OK);
        match body {
            CheckLocationResponse::Success {
                distance,
                is_in_hostel,
                current_location,
                hostel_location,
            } => {
                assert!(distance.abs() < 1e-6);
                assert!(is_in_hostel);
                assert_eq!(current_location, [12.9, 77.6]);
                assert_eq!(hostel_location, [12.9, 77.6]);
            }
            CheckLocationResponse::Error { message } => panic!("unexpected error {message}"),
        }
    }

    #[tokio::test]
    async fn test_check_location_outside_radius() {
        let (_, body): (_, CheckLocationResponse) =
            call(&router(), Method::GET, "/check_location/12.9045/77.6", None).await;
        assert!(matches!(
            body,
            CheckLocationResponse::Success { is_in_hostel: false, distance, .. }
                if (distance - 500.4).abs() < 1.0
        ));
    }

    #[tokio::test]
    async fn test_check_location_rejects_garbage() {
        let app = router();
        for uri in ["/check_location/abc/77.6", "/check_location/91/77.6"] {
            let (status, body): (_, serde_json::Value) = call(&app, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "error", "{uri}");
            assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
        }
    }

    #[tokio::test]
    async fn test_check_location_keeps_sessions_in_step() {
        let app = router();
        let checks = [
            "/check_location/12.9/77.6",
            "/check_location/12.9/77.6",
            "/check_location/12.9045/77.6",
            "/check_location/12.9045/77.6",
            "/check_location/12.9/77.6",
            "/check_location/abc/77.6",
        ];
        for uri in checks {
            let _: (_, serde_json::Value) = call(&app, Method::GET, uri, Some("pixel")).await;
        }

        let (_, records): (_, Vec<AttendanceRecord>) =
            call(&app, Method::GET, "/attendance_data", None).await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.user_id == "pixel"));
        assert!(records[0].is_open());
        assert!(records[1].exit_time.is_some());
        assert!(records[1].duration.is_some());

        let (_, status): (_, AttendanceStatus) =
            call(&app, Method::GET, "/check_attendance_status", Some("pixel")).await;
        assert!(status.marked_today);

        let (_, confirmed): (_, SessionResponse) =
            call(&app, Method::POST, "/attendance/entry", Some("pixel")).await;
        assert!(!confirmed.changed);
        assert_eq!(confirmed.session.unwrap().id, records[0].id);
    }

    #[tokio::test]
    async fn test_entry_exit_session_lifecycle() {
        let app = router();

        let (_, status): (_, AttendanceStatus) =
            call(&app, Method::GET, "/check_attendance_status", Some("pixel")).await;
        assert!(!status.marked_today);

        let (_, opened): (_, SessionResponse) =
            call(&app, Method::POST, "/attendance/entry", Some("pixel")).await;
        assert!(opened.changed);
        let session = opened.session.unwrap();
        assert!(session.is_open());
        assert_eq!(session.user_id, "pixel");

        let (_, again): (_, SessionResponse) =
            call(&app, Method::POST, "/attendance/entry", Some("pixel")).await;
        assert!(!again.changed);
        assert_eq!(again.session.unwrap().id, session.id);

        let (_, status): (_, AttendanceStatus) =
            call(&app, Method::GET, "/check_attendance_status", Some("pixel")).await;
        assert!(status.marked_today);

        let (_, closed): (_, SessionResponse) =
            call(&app, Method::POST, "/attendance/exit", Some("pixel")).await;
        assert!(closed.changed);
        let closed = closed.session.unwrap();
        assert_eq!(closed.id, session.id);
        assert!(closed.exit_time.is_some());
        assert!(closed.duration.is_some_and(|d| d >= 0));
    }

    #[tokio::test]
    async fn test_exit_without_session_is_not_an_error() {
        let (status, body): (_, SessionResponse) =
            call(&router(), Method::POST, "/attendance/exit", Some("nobody")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.changed);
        assert!(body.session.is_none());
    }

    #[tokio::test]
    async fn test_attendance_data_lists_all_devices() {
        let app = router();
        let _: (_, SessionResponse) = call(&app, Method::POST, "/attendance/entry", Some("a")).await;
        let _: (_, SessionResponse) = call(&app, Method::POST, "/attendance/entry", Some("b")).await;

        let (_, records): (_, Vec<AttendanceRecord>) =
            call(&app, Method::GET, "/attendance_data", None).await;
        assert_eq!(records.len(), 2);
        assert!(records[0].entry_time >= records[1].entry_time);

        let (_, raw): (_, serde_json::Value) =
            call(&app, Method::GET, "/attendance_data", None).await;
        assert!(raw[0]["exit_time"].is_null());
        assert!(raw[0]["duration"].is_null());
    }

    #[tokio::test]
    async fn test_unidentified_callers_share_unknown_identity() {
        let app = router();
        let _: (_, SessionResponse) = call(&app, Method::POST, "/attendance/entry", None).await;
        let (_, records): (_, Vec<AttendanceRecord>) =
            call(&app, Method::GET, "/attendance_data", None).await;
        assert_eq!(records[0].user_id, attendance::UNKNOWN_DEVICE);
    }

    #[tokio::test]
    async fn test_openapi_is_served() {
        let (status, body): (_, serde_json::Value) =
            call(&router(), Method::GET, "/api/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["title"], "hostelwatch API");
    }
}
