//! Attendance endpoints.
//!
//! Sessions are keyed by the calling device: the `x-device-id` header when
//! present, otherwise the peer IP address.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::request::Parts;
use axum::Json;
use chrono::Utc;
use hostelwatch_core::{AttendanceRecord, AttendanceStatus, SessionResponse, DEVICE_ID_HEADER};
use tracing::info;

use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Identity used when neither a header nor a peer address is available.
pub const UNKNOWN_DEVICE: &str = "unknown";

/// The calling device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for DeviceId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(DEVICE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(id) = header {
            return Ok(Self(id.to_string()));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(Self(peer.unwrap_or_else(|| UNKNOWN_DEVICE.to_string())))
    }
}

/// Whether the caller already has an entry today.
#[utoipa::path(
    get,
    path = "/check_attendance_status",
    tag = "attendance",
    operation_id = "checkAttendanceStatus",
    summary = "Check whether attendance is marked today",
    description = "Returns `markedToday: true` when the calling device has a session whose \
        entry time falls on today's date in the server's configured timezone.",
    params(
        ("x-device-id" = Option<String>, Header, description = "Device identity; defaults to the peer IP")
    ),
    responses(
        (status = 200, description = "Status retrieved", body = AttendanceStatus)
    )
)]
pub async fn check_attendance_status(
    State(state): State<SharedState>,
    DeviceId(device): DeviceId,
) -> Json<AttendanceStatus> {
    let marked_today = state.ledger().await.marked_on_day_of(&device, Utc::now());
    Json(AttendanceStatus { marked_today })
}

/// Open a session for the caller, or confirm the open one.
#[utoipa::path(
    post,
    path = "/attendance/entry",
    tag = "attendance",
    operation_id = "signalEntry",
    summary = "Record an entry",
    description = "Opens a new attendance session for the calling device. When a session is \
        already open it is returned unchanged with `changed: false`.",
    params(
        ("x-device-id" = Option<String>, Header, description = "Device identity; defaults to the peer IP")
    ),
    responses(
        (status = 200, description = "Session opened or confirmed", body = SessionResponse),
        (status = 500, description = "Ledger could not be saved", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn signal_entry(
    State(state): State<SharedState>,
    DeviceId(device): DeviceId,
) -> ApiResult<Json<SessionResponse>> {
    let now = Utc::now();
    let (session, created) = state
        .update_ledger(|ledger| {
            let (session, created) = ledger.open(&device, now);
            ((session, created), created)
        })
        .await?;

    if created {
        info!(device = %device, entry_time = %now, "attendance_marked");
    }
    Ok(Json(SessionResponse {
        changed: created,
        session: Some(session),
    }))
}

/// Close the caller's open session.
#[utoipa::path(
    post,
    path = "/attendance/exit",
    tag = "attendance",
    operation_id = "signalExit",
    summary = "Record an exit",
    description = "Closes the calling device's open session, recording the exit time and the \
        duration in whole seconds. Without an open session nothing changes and `session` is null.",
    params(
        ("x-device-id" = Option<String>, Header, description = "Device identity; defaults to the peer IP")
    ),
    responses(
        (status = 200, description = "Session closed or nothing open", body = SessionResponse),
        (status = 500, description = "Ledger could not be saved", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn signal_exit(
    State(state): State<SharedState>,
    DeviceId(device): DeviceId,
) -> ApiResult<Json<SessionResponse>> {
    let closed = state
        .update_ledger(|ledger| {
            let closed = ledger.close(&device, Utc::now());
            let changed = closed.is_some();
            (closed, changed)
        })
        .await?;

    if let Some(session) = &closed {
        info!(device = %device, duration_secs = ?session.duration, "exit_recorded");
    }
    Ok(Json(SessionResponse {
        changed: closed.is_some(),
        session: closed,
    }))
}

/// Every recorded session, newest entry first.
#[utoipa::path(
    get,
    path = "/attendance_data",
    tag = "attendance",
    operation_id = "getAttendanceData",
    summary = "List attendance history",
    description = "Returns all sessions of all devices ordered by entry time, newest first. \
        Open sessions have null `exit_time` and `duration`.",
    responses(
        (status = 200, description = "History retrieved", body = Vec<AttendanceRecord>)
    )
)]
pub async fn attendance_data(State(state): State<SharedState>) -> Json<Vec<AttendanceRecord>> {
    Json(state.ledger().await.history())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> DeviceId {
        let (mut parts, ()) = request.into_parts();
        DeviceId::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_header_wins() {
        let mut request = Request::builder()
            .header(DEVICE_ID_HEADER, " pixel-7 ")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 5], 5555))));
        assert_eq!(extract(request).await, DeviceId("pixel-7".into()));
    }

    #[tokio::test]
    async fn test_falls_back_to_peer_ip() {
        let mut request = Request::builder().header(DEVICE_ID_HEADER, "").body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 5], 5555))));
        assert_eq!(extract(request).await, DeviceId("10.0.0.5".into()));
    }

    #[tokio::test]
    async fn test_unknown_without_header_or_peer() {
        let request = Request::builder().body(()).unwrap();
        assert_eq!(extract(request).await, DeviceId(UNKNOWN_DEVICE.into()));
    }
}
