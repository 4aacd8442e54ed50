//! HTTP error mapping.
//!
//! Every failure leaving the API is `{"message": "..."}` with a status that
//! matches the domain error: validation 400, unknown subscriber 404,
//! duplicate endpoint 409, gone endpoint 410, transient push failure 502,
//! storage failure 500.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::delivery::DeliveryError;
use crate::notifications::sender::SendError;
use crate::registry::RegistryError;

/// Error returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or invalid request body.
    BadRequest(String),
    /// Unknown subscriber.
    NotFound(String),
    /// Endpoint already registered.
    Conflict(String),
    /// The push service reported the endpoint gone; it has been removed.
    Gone(String),
    /// The push service failed transiently.
    BadGateway(String),
    /// Storage or other server-side failure. Details are logged, not returned.
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Gone(_) => StatusCode::GONE,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Gone(m)
            | Self::BadGateway(m)
            | Self::Internal(m) => write!(f, "{m}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Internal(detail) => {
                log::error!("[error] {detail}");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Validation(v) => Self::BadRequest(v.to_string()),
            RegistryError::Conflict { .. } => Self::Conflict(e.to_string()),
            RegistryError::NotFound { .. } => Self::NotFound(e.to_string()),
            RegistryError::Store(s) => Self::Internal(s.to_string()),
        }
    }
}

impl From<DeliveryError> for ApiError {
    fn from(e: DeliveryError) -> Self {
        match e {
            DeliveryError::NotFound { .. } => Self::NotFound(e.to_string()),
            DeliveryError::Send(SendError::Gone { status }) => Self::Gone(format!(
                "Subscription expired (HTTP {status}) and was removed"
            )),
            DeliveryError::Send(send) => Self::BadGateway(send.to_string()),
            DeliveryError::Registry(r) => Self::Internal(r.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}
