//! API error types and response handling.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hostelwatch_core::WatchError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
///
/// Each variant maps to one HTTP status code and renders an [`ErrorResponse`].
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - invalid input from the client.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 500 Internal Server Error - the server could not complete the request.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// Any other status carried over from a core error.
    Other {
        /// HTTP status to respond with.
        status: StatusCode,
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "PERSISTENCE_ERROR",
    "message": "Persistence error: failed to write attendance.json",
    "details": null
}))]
pub struct ErrorResponse {
    /// Machine-readable error code.
    #[schema(example = "PERSISTENCE_ERROR")]
    pub error: String,

    /// Human-readable error message.
    pub message: String,

    /// Optional additional details.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// The HTTP status this error renders with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Other { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, message) = match self {
            Self::BadRequest {
                error_code,
                message,
            }
            | Self::Other {
                error_code,
                message,
                ..
            } => (error_code, message),
            Self::InternalError {
                error_code,
                message,
            } => {
                tracing::error!(error_code = %error_code, message = %message, "internal_error");
                (error_code, message)
            }
        };

        let body = ErrorResponse {
            error: error_code,
            message,
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
            Self::Other {
                status, message, ..
            } => write!(f, "{status}: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<WatchError> for ApiError {
    fn from(err: WatchError) -> Self {
        let error_code = err.error_code().to_string();
        let message = err.to_string();
        match StatusCode::from_u16(err.http_status_code()) {
            Ok(StatusCode::BAD_REQUEST) => Self::BadRequest {
                error_code,
                message,
            },
            Ok(StatusCode::INTERNAL_SERVER_ERROR) | Err(_) => Self::InternalError {
                error_code,
                message,
            },
            Ok(status) => Self::Other {
                status,
                error_code,
                message,
            },
        }
    }
}
