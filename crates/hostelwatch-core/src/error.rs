//! Unified error type for the hostelwatch core library.
//!
//! [`WatchError`] covers the failures that end an operation outright: bad
//! coordinates, unusable configuration, an HTTP client that cannot be built,
//! and persistence. Per-cycle failures stay in their own types
//! ([`SensorFailure`], [`RemoteFailure`]) and are reported, not returned.
//! [`StorageError`] converts into [`WatchError`] at crate boundaries.
//!
//! # Example
//!
//! ```rust
//! use hostelwatch_core::error::{Result, WatchError};
//!
//! fn require_latitude(lat: f64) -> Result<f64> {
//!     if !(-90.0..=90.0).contains(&lat) {
//!         return Err(WatchError::InvalidCoordinates(format!("latitude {lat}")));
//!     }
//!     Ok(lat)
//! }
//! # assert!(require_latitude(91.0).is_err());
//! ```
//!
//! [`SensorFailure`]: crate::position::SensorFailure
//! [`RemoteFailure`]: crate::client::RemoteFailure
//! [`StorageError`]: crate::storage::StorageError

use thiserror::Error;

/// The unified error type for all hostelwatch operations.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Latitude/longitude outside the valid range or not a number.
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    /// The HTTP client for the backend could not be built.
    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),

    /// An error occurred while persisting or reading data.
    #[error("Persistence error: {0}")]
    PersistenceError(String),
}

/// A specialized [`Result`] type for hostelwatch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

impl WatchError {
    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidCoordinates(_) => 400,
            Self::ConfigValidationError(_) => 422,
            Self::HttpClient(_) | Self::PersistenceError(_) => 500,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCoordinates(_) => "INVALID_COORDINATES",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::HttpClient(_) => "HTTP_CLIENT_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
        }
    }
}

impl From<crate::storage::StorageError> for WatchError {
    fn from(err: crate::storage::StorageError) -> Self {
        use crate::storage::StorageError;
        match err {
            StorageError::ReadError { path, source } => {
                Self::PersistenceError(format!("Failed to read {}: {}", path.display(), source))
            }
            StorageError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {}: {}", path.display(), source))
            }
            StorageError::ParseError { path, source } => {
                Self::PersistenceError(format!("Failed to parse {}: {}", path.display(), source))
            }
            StorageError::SerializeError(e) => Self::PersistenceError(e.to_string()),
            StorageError::CreateDirError { path, source } => Self::PersistenceError(format!(
                "Failed to create directory {}: {}",
                path.display(),
                source
            )),
        }
    }
}
