//! Response envelope shared by every endpoint.
//!
//! Successful responses and errors use the same JSON shape:
//!
//! ```json
//! { "code": 200, "message": "success", "data": { ... } }
//! ```
//!
//! `code` mirrors the HTTP status and `data` is omitted when there is none.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// JSON envelope `{code, message, data}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// HTTP status code
    pub code: u16,
    /// Human-readable message
    pub message: String,
    /// Payload, absent for errors and empty results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// A 200 response carrying `data`.
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: "success".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// An envelope without payload.
    #[must_use]
    pub fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}
