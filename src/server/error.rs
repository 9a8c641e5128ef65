use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Route-level errors. Validation and not-found carry a descriptive
/// message; internal errors surface only a generic body and log the cause.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Not authenticated.")]
    NotAuthenticated,

    /// Bad credentials on login; distinct from a missing/invalid token but
    /// answered with the same status.
    #[error("{0}")]
    Unauthorized(String),

    #[error("Unauthorized. Admin only.")]
    AdminOnly,

    #[error("Account is frozen. Contact an admin.")]
    Frozen,

    /// A stable user-facing failure message; the cause was already logged.
    #[error("{0}")]
    Failure(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        ApiError::NotFound(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            ApiError::NotAuthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message.clone()),
            ApiError::AdminOnly | ApiError::Frozen => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::Failure(message) => (StatusCode::INTERNAL_SERVER_ERROR, message.to_string()),
            ApiError::Internal(err) => {
                error!("Internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error.".to_string(),
                )
            }
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}
