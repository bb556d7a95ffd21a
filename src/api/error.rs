//! Unified API error handling.
//!
//! All errors leave the API in a standard JSON envelope with an
//! appropriate HTTP status code. Domain failures raised by the core
//! (gates, guards, token service, workflow engine) are translated here
//! and nowhere else, so every failure kind has exactly one status
//! mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::DomainError;

/// Error codes for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Client errors (4xx)
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    ValidationError,

    // Server errors (5xx)
    InternalError,
    DatabaseError,
}

impl ErrorCode {
    /// Get the default HTTP status code for this error code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::DatabaseError => "database_error",
        }
    }
}

/// The error object serialized in responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Field-level validation errors, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Vec<String>>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    status: StatusCode,
    message: String,
    details: Option<HashMap<String, Vec<String>>>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.status_code(),
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Validation error (400) with field-level details
    pub fn validation(errors: HashMap<String, Vec<String>>) -> Self {
        let message = if errors.len() == 1 {
            errors
                .values()
                .next()
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string())
        } else {
            format!("Validation failed for {} fields", errors.len())
        };

        let mut err = Self::new(ErrorCode::ValidationError, message);
        err.details = Some(errors);
        err
    }

    /// Single field validation error
    pub fn validation_field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.into()]);
        Self::validation(errors)
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[cfg(test)]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let response = ErrorResponse {
            error: ErrorBody {
                code: self.code.as_str().to_string(),
                message: self.message,
                details: self.details,
            },
        };

        (self.status, Json(response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);

        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("Resource not found"),
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                if msg.contains("UNIQUE constraint failed") {
                    ApiError::conflict("A resource with this identifier already exists")
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    ApiError::bad_request("Referenced resource does not exist")
                } else {
                    ApiError::database("A database error occurred")
                }
            }
            _ => ApiError::database("A database error occurred"),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::InvalidCredentials | DomainError::InvalidAccessToken => {
                ApiError::unauthorized(message)
            }
            DomainError::UserInactiveOrDeleted => ApiError::unauthorized(message),
            DomainError::AccountDeactivated | DomainError::InvalidRefreshToken => {
                ApiError::forbidden(message)
            }
            DomainError::Forbidden(_)
            | DomainError::NotAProjectMember
            | DomainError::ProjectArchived => ApiError::forbidden(message),
            DomainError::CannotRemoveLastAdmin
            | DomainError::CannotRemoveLastManager
            | DomainError::TaskAlreadyDone
            | DomainError::InvalidTransition { .. }
            | DomainError::UserNotProjectMember
            | DomainError::Validation(_) => ApiError::bad_request(message),
            DomainError::NotFound(_) => ApiError::not_found(message),
            DomainError::Conflict(_) => ApiError::conflict(message),
            DomainError::Database(e) => ApiError::from(e),
            DomainError::TokenSigning => ApiError::internal(message),
        }
    }
}

/// Builder for collecting multiple validation errors
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    errors: HashMap<String, Vec<String>>,
}

impl ValidationErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Return Ok(()) if no errors were collected, or Err(ApiError)
    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TaskStatus;

    #[test]
    fn error_codes_map_to_status() {
        assert_eq!(ErrorCode::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::Conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn domain_errors_map_to_the_documented_statuses() {
        let cases: Vec<(DomainError, StatusCode)> = vec![
            (DomainError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (DomainError::InvalidAccessToken, StatusCode::UNAUTHORIZED),
            (DomainError::UserInactiveOrDeleted, StatusCode::UNAUTHORIZED),
            (DomainError::AccountDeactivated, StatusCode::FORBIDDEN),
            (DomainError::InvalidRefreshToken, StatusCode::FORBIDDEN),
            (DomainError::NotAProjectMember, StatusCode::FORBIDDEN),
            (DomainError::ProjectArchived, StatusCode::FORBIDDEN),
            (DomainError::CannotRemoveLastAdmin, StatusCode::BAD_REQUEST),
            (DomainError::CannotRemoveLastManager, StatusCode::BAD_REQUEST),
            (DomainError::TaskAlreadyDone, StatusCode::BAD_REQUEST),
            (
                DomainError::InvalidTransition {
                    from: TaskStatus::Todo,
                    to: TaskStatus::Done,
                },
                StatusCode::BAD_REQUEST,
            ),
            (DomainError::UserNotProjectMember, StatusCode::BAD_REQUEST),
            (DomainError::NotFound("Project"), StatusCode::NOT_FOUND),
            (
                DomainError::conflict("Invite already sent"),
                StatusCode::CONFLICT,
            ),
        ];

        for (domain, status) in cases {
            let api = ApiError::from(domain);
            assert_eq!(api.status(), status, "wrong status for {}", api.message());
        }
    }

    #[test]
    fn guard_messages_are_stable() {
        let api = ApiError::from(DomainError::CannotRemoveLastManager);
        assert_eq!(api.message(), "Project must have at least one manager");

        let api = ApiError::from(DomainError::TaskAlreadyDone);
        assert_eq!(api.message(), "Completed tasks cannot be modified");

        let api = ApiError::from(DomainError::InvalidTransition {
            from: TaskStatus::InProgress,
            to: TaskStatus::Todo,
        });
        assert_eq!(
            api.message(),
            "Invalid status transition from IN_PROGRESS to TODO"
        );
    }

    #[test]
    fn validation_builder_collects_field_errors() {
        let mut builder = ValidationErrorBuilder::new();
        builder.add("email", "Invalid email format");
        builder.add("role", "Invalid role");

        assert!(!builder.is_empty());
        let err = builder.finish().unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
