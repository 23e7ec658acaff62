//! HTTP client for the hostelwatch backend.
//!
//! [`BackendClient`] implements both [`GeofenceClient`] and
//! [`AttendanceBackend`] against the backend's JSON endpoints:
//!
//! ```text
//! GET  /check_location/{lat}/{lon}   geofence evaluation
//! GET  /check_attendance_status      {"markedToday": bool}
//! POST /attendance/entry             open or confirm a session
//! POST /attendance/exit              close the open session
//! GET  /attendance_data              session history
//! ```
//!
//! The device identity travels in the `x-device-id` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::attendance::AttendanceBackend;
use crate::config::TrackerConfig;
use crate::error::{Result, WatchError};
use crate::geofence::{GeofenceClient, GeofenceResult};
use crate::position::PositionSample;
use crate::types::{AttendanceRecord, AttendanceStatus, CheckLocationResponse, SessionResponse};

/// Header carrying the tracked device's identity.
pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// Failure of a call to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteFailure {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The backend responded, but with an error.
    #[error("server error: {0}")]
    Server(String),
}

impl RemoteFailure {
    /// Returns a machine-readable failure kind.
    #[inline]
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "NETWORK_ERROR",
            Self::Server(_) => "SERVER_ERROR",
        }
    }
}

impl From<reqwest::Error> for RemoteFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Server(format!("invalid response body: {err}"))
        } else if err.is_status() {
            Self::Server(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// HTTP client for the hostelwatch backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Url,
    device_id: Option<String>,
}

impl BackendClient {
    /// Creates a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: Url, timeout: Duration, device_id: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            device_id,
        })
    }

    /// Creates a client from the tracker configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL is invalid or the client cannot be built.
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        let base_url = Url::parse(&config.server_url).map_err(|e| {
            WatchError::ConfigValidationError(format!("tracker.server_url: {e}"))
        })?;
        Self::new(
            base_url,
            Duration::from_secs(config.request_timeout_secs),
            config.device_id.clone(),
        )
    }

    /// The backend base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
    ) -> std::result::Result<T, RemoteFailure> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| RemoteFailure::Network(format!("invalid URL for {path}: {e}")))?;

        let mut request = self.client.request(method.clone(), url);
        if let Some(device_id) = &self.device_id {
            request = request.header(DEVICE_ID_HEADER, device_id);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(method = %method, path, status = status.as_u16(), "backend_response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteFailure::Server(format!(
                "{method} {path} returned {status}: {}",
                body.trim()
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl GeofenceClient for BackendClient {
    async fn check(
        &self,
        sample: &PositionSample,
    ) -> std::result::Result<GeofenceResult, RemoteFailure> {
        let path = format!("/check_location/{}/{}", sample.latitude, sample.longitude);
        let response: CheckLocationResponse = self.call(Method::GET, &path).await?;
        GeofenceResult::try_from(response)
    }
}

#[async_trait]
impl AttendanceBackend for BackendClient {
    async fn attendance_status(&self) -> std::result::Result<AttendanceStatus, RemoteFailure> {
        self.call(Method::GET, "/check_attendance_status").await
    }

    async fn signal_entry(&self) -> std::result::Result<(), RemoteFailure> {
        let response: SessionResponse = self.call(Method::POST, "/attendance/entry").await?;
        debug!(opened = response.changed, "entry_signalled");
        Ok(())
    }

    async fn signal_exit(&self) -> std::result::Result<(), RemoteFailure> {
        let response: SessionResponse = self.call(Method::POST, "/attendance/exit").await?;
        debug!(closed = response.changed, "exit_signalled");
        Ok(())
    }

    async fn history(&self) -> std::result::Result<Vec<AttendanceRecord>, RemoteFailure> {
        self.call(Method::GET, "/attendance_data").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_rejects_bad_url() {
        let config = TrackerConfig {
            server_url: "not a url".into(),
            ..TrackerConfig::default()
        };
        let err = BackendClient::from_config(&config).unwrap_err();
        assert!(matches!(err, WatchError::ConfigValidationError(ref m) if m.contains("server_url")));
    }

    #[test]
    fn test_from_config_keeps_base_url() {
        let client = BackendClient::from_config(&TrackerConfig::default()).unwrap();
        assert_eq!(client.base_url().as_str(), "http://127.0.0.1:3000/");
    }

    #[test]
    fn test_remote_failure_codes() {
        assert_eq!(RemoteFailure::Network("x".into()).code(), "NETWORK_ERROR");
        assert_eq!(RemoteFailure::Server("x".into()).code(), "SERVER_ERROR");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_network_failure() {
        // Port 9 (discard) on localhost is closed on test machines.
        let client = BackendClient::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            Duration::from_secs(2),
            None,
        )
        .unwrap();
        let err = client.attendance_status().await.unwrap_err();
        assert!(matches!(err, RemoteFailure::Network(_)));
    }
}
