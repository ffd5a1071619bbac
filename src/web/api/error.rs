use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::Permission;
use crate::reporter::ReporterError;
use crate::source::PushError;

pub enum ApiError {
    Unauthorized(&'static str),
    MissingPermission(Permission),
    Validation(String),
    NotFound(&'static str),
    Conflict(&'static str),
    Forbidden(&'static str),
    Unavailable(&'static str),
    Internal(String),
}

impl From<ReporterError> for ApiError {
    fn from(e: ReporterError) -> Self {
        match e {
            ReporterError::PermissionDenied => ApiError::Forbidden("location_permission_denied"),
            ReporterError::InvalidInterval(_) => ApiError::Validation(e.to_string()),
            ReporterError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<PushError> for ApiError {
    fn from(e: PushError) -> Self {
        match e {
            PushError::NotSubscribed => ApiError::Conflict("not_tracking"),
            PushError::Backlogged => ApiError::Unavailable("subscription_backlogged"),
            PushError::InvalidSample => ApiError::Validation(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(reason) => {
                (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(reason))).into_response()
            }
            ApiError::MissingPermission(permission) => (
                StatusCode::FORBIDDEN,
                Json(ErrorResponse::with_message(
                    "missing_permission",
                    &permission.to_string(),
                )),
            )
                .into_response(),
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::with_message("validation_failed", &msg)),
            )
                .into_response(),
            ApiError::NotFound(reason) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse::new(reason))).into_response()
            }
            ApiError::Conflict(reason) => {
                (StatusCode::CONFLICT, Json(ErrorResponse::new(reason))).into_response()
            }
            ApiError::Forbidden(reason) => {
                (StatusCode::FORBIDDEN, Json(ErrorResponse::new(reason))).into_response()
            }
            ApiError::Unavailable(reason) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new(reason)),
            )
                .into_response(),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::with_message("internal_error", &msg)),
            )
                .into_response(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &str) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: None,
        }
    }

    pub fn with_message(error: &str, message: &str) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: Some(message.to_string()),
        }
    }
}
