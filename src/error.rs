//! Domain error taxonomy.
//!
//! Core components (token service, gates, guards, workflow engine) raise
//! these typed variants; the API boundary in `api::error` maps each one to
//! an HTTP status and a stable message. Handlers never match on message
//! strings.

use crate::db::TaskStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    // Authentication failures (401 unless noted)
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Valid credentials but the account is soft-deleted (403)
    #[error("Account is deactivated")]
    AccountDeactivated,

    #[error("Invalid or expired access token")]
    InvalidAccessToken,

    /// Refresh token unknown, already rotated, or past expiry (403)
    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,

    /// The refresh token's owning user no longer exists or is inactive
    #[error("User not found or inactive")]
    UserInactiveOrDeleted,

    // Authorization failures (403)
    #[error("{0}")]
    Forbidden(String),

    #[error("You are not a member of this project")]
    NotAProjectMember,

    #[error("Archived projects are read-only")]
    ProjectArchived,

    // Invariant violations (400)
    #[error("Organization must have at least one active admin")]
    CannotRemoveLastAdmin,

    #[error("Project must have at least one manager")]
    CannotRemoveLastManager,

    #[error("Completed tasks cannot be modified")]
    TaskAlreadyDone,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("User is not a member of this project")]
    UserNotProjectMember,

    #[error("{0}")]
    Validation(String),

    // Resource absent or outside the caller's org scope (404)
    #[error("{0} not found")]
    NotFound(&'static str),

    // Duplicate email / outstanding invite (409)
    #[error("{0}")]
    Conflict(String),

    // Persistence layer failure (500)
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("Failed to sign access token")]
    TokenSigning,
}

impl DomainError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}
