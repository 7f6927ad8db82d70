//! Error types for the relay's HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use riskmap_lock_core::LockError;
use serde::Serialize;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            error: String,
            code: &'static str,
        }

        let (status, code) = match &self {
            ServerError::Lock(LockError::RelayClosed) => {
                (StatusCode::SERVICE_UNAVAILABLE, "RELAY_UNAVAILABLE")
            }
            ServerError::Lock(LockError::Protocol(_)) => (StatusCode::BAD_REQUEST, "PROTOCOL_ERROR"),
            ServerError::Lock(LockError::Serialization(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR")
            }
        };

        let body = ErrorBody {
            error: self.to_string(),
            code,
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
