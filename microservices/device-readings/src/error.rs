//! Error types for Device Readings

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use readings_core::ReadingsError;
use serde_json::json;
use uuid::Uuid;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Device Readings error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The device store is full; raised only when registering a new device
    #[error("Capacity exceeded")]
    CapacityExceeded { capacity: usize },

    #[error("Device with id {0} not found")]
    DeviceNotFound(Uuid),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Platform(#[from] ReadingsError),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::CapacityExceeded { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Platform(inner) => StatusCode::from_u16(inner.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        };

        if let Error::Platform(inner) = &self {
            tracing::error!(code = inner.error_code(), "Platform error: {:?}", inner);
        }

        let body = Json(json!({
            "message": self.to_string(),
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}
