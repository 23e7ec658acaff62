//! Position sampling.
//!
//! A [`PositionSource`] wraps whatever the platform offers for locating the
//! device (a GNSS daemon, a helper program, a fixed kiosk position) and yields
//! one [`PositionSample`] per request or a typed [`SensorFailure`]. Sources hold
//! no state beyond the request they are serving; scheduling and retries belong
//! to [`RetryingSampler`](crate::sampler::RetryingSampler).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// Latitude in decimal degrees.
    pub latitude: f64,

    /// Longitude in decimal degrees.
    pub longitude: f64,

    /// Estimated horizontal accuracy radius in meters.
    pub accuracy_meters: f64,

    /// When the fix was taken.
    pub taken_at: DateTime<Utc>,
}

impl PositionSample {
    /// Creates a sample stamped with the current time.
    #[must_use]
    pub fn now(latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
            taken_at: Utc::now(),
        }
    }
}

/// Why a position could not be obtained.
///
/// Every kind is reported separately; only [`SensorFailure::Timeout`] is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorFailure {
    /// The platform refused access to the location.
    #[error("location permission denied")]
    PermissionDenied,

    /// The platform could not determine a position.
    #[error("position unavailable: {0}")]
    Unavailable(String),

    /// No fix arrived before the request deadline.
    #[error("position request timed out")]
    Timeout,

    /// Anything the platform did not classify.
    #[error("unknown location error: {0}")]
    Unknown(String),
}

impl SensorFailure {
    /// Returns `true` for failures worth retrying within the same tick.
    #[inline]
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns a machine-readable failure kind.
    #[inline]
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Unavailable(_) => "POSITION_UNAVAILABLE",
            Self::Timeout => "TIMEOUT",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Parameters for one position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRequest {
    /// How long the source may take before the request counts as timed out.
    pub timeout: Duration,

    /// Ask the platform for its most accurate (and slowest) positioning mode.
    pub high_accuracy: bool,
}

impl Default for PositionRequest {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            high_accuracy: true,
        }
    }
}

/// Produces position samples on demand.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Takes one position sample.
    ///
    /// # Errors
    ///
    /// Returns the [`SensorFailure`] kind reported by the platform.
    async fn sample(&self, request: &PositionRequest) -> Result<PositionSample, SensorFailure>;
}

/// A source that always reports the same coordinates.
///
/// Useful for fixed installations and for exercising the backend end-to-end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticPositionSource {
    latitude: f64,
    longitude: f64,
    accuracy_meters: f64,
}

impl StaticPositionSource {
    /// Creates a source pinned to the given position.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
        }
    }
}

#[async_trait]
impl PositionSource for StaticPositionSource {
    async fn sample(&self, _request: &PositionRequest) -> Result<PositionSample, SensorFailure> {
        Ok(PositionSample::now(
            self.latitude,
            self.longitude,
            self.accuracy_meters,
        ))
    }
}
