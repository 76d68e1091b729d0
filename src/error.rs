// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::action::ActionError;
use crate::auth::AuthError;
use crate::presenter::PresenterError;

/// Message returned for every internal failure; the detail is only logged
pub const INTERNAL_ERROR_MESSAGE: &str = "An error occurred while processing your request";

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError(String),
    InvalidJson(String),
    Unauthenticated(String),

    // 403 Forbidden
    Forbidden(String),

    // 405 Method Not Allowed
    MethodNotAllowed(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError(_) => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthenticated(_) => 400,
            ApiError::Forbidden(_) => 403,
            ApiError::MethodNotAllowed(_) => 405,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError(msg) => msg,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthenticated(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::MethodNotAllowed(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "message": self.message(),
            "code": self.error_code()
        })
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "ACTION_ERROR",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthenticated(_) => "AUTHENTICATION_ERROR",
            ApiError::Forbidden(_) => "PERMISSION_DENIED",
            ApiError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

// Static constructors
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        ApiError::ValidationError(message.into())
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn method_not_allowed() -> Self {
        ApiError::MethodNotAllowed("Method not allowed. Use POST instead.".to_string())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error() -> Self {
        ApiError::InternalServerError(INTERNAL_ERROR_MESSAGE.to_string())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<ActionError> for ApiError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::Validation(msg) => ApiError::validation_error(msg),
            ActionError::Action(msg) | ActionError::NotFound(msg) => ApiError::bad_request(msg),
            ActionError::PermissionDenied(msg) => ApiError::forbidden(msg),
            ActionError::Conflict(msg) => {
                tracing::warn!("Datastore conflict surfaced to client: {}", msg);
                ApiError::conflict(msg)
            }
            ActionError::Internal(msg) => {
                // Log the real error but return generic message
                tracing::error!("Internal action error: {}", msg);
                ApiError::internal_server_error()
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidSecret | AuthError::TokenGeneration(_) => {
                tracing::error!("Authentication setup error: {}", err);
                ApiError::internal_server_error()
            }
            other => ApiError::Unauthenticated(other.to_string()),
        }
    }
}

impl From<PresenterError> for ApiError {
    fn from(err: PresenterError) -> Self {
        match err {
            PresenterError::Unknown(_) | PresenterError::InvalidData(_) => {
                ApiError::bad_request(err.to_string())
            }
            PresenterError::Datastore(inner) => ActionError::from(inner).into(),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_errors_map_to_status() {
        let cases = [
            (ActionError::Validation("v".into()), 400),
            (ActionError::Action("a".into()), 400),
            (ActionError::NotFound("Model 'poll/1' does not exist.".into()), 400),
            (ActionError::PermissionDenied("p".into()), 403),
            (ActionError::Conflict("c".into()), 409),
            (ActionError::Internal("i".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_internal_detail_is_redacted() {
        let err = ApiError::from(ActionError::Internal("connection refused".into()));
        assert_eq!(err.message(), INTERNAL_ERROR_MESSAGE);
        assert_eq!(
            err.to_json(),
            json!({
                "success": false,
                "message": INTERNAL_ERROR_MESSAGE,
                "code": "INTERNAL_SERVER_ERROR",
            })
        );
    }

    #[test]
    fn test_auth_failure_is_bad_request() {
        let err = ApiError::from(AuthError::InvalidToken("expired".into()));
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.message(), "Invalid token: expired");
    }
}
