//! API error type and its mapping to HTTP status codes.
//!
//! Bridge clients only look at the status code, so error responses carry no
//! body. The message is logged instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use vobridge_automation::AutomationError;

/// API error type that maps to HTTP status codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - nothing to return yet.
    NotFound(String),
    /// 500 Internal Server Error - automation call could not be set up.
    Internal(String),
    /// 501 Not Implemented - automation call ran and reported an error.
    NotImplemented(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Internal(msg)
            | ApiError::NotImplemented(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), message = %self.message(), "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), message = %self.message(), "Request rejected");
        }
        status.into_response()
    }
}

impl From<AutomationError> for ApiError {
    fn from(err: AutomationError) -> Self {
        match err {
            AutomationError::Unavailable(msg) => ApiError::Internal(msg),
            AutomationError::Execution(msg) => ApiError::NotImplemented(msg),
        }
    }
}
