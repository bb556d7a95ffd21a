//! Audit log models and the append helper.
//!
//! The audit trail is write-only for the core: rows are appended alongside
//! every state mutation and never updated or deleted.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: String,
    pub org_id: String,
    pub user_id: Option<String>,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    pub details: Option<String>,
    pub created_at: String,
}

/// Audit entry joined with the acting user's name for display
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLogWithUser {
    pub id: String,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    pub details: Option<String>,
    pub created_at: String,
    pub user_name: Option<String>,
}

/// Common audit action types
pub mod actions {
    pub const AUTH_SIGNUP: &str = "auth.signup";
    pub const AUTH_LOGIN: &str = "auth.login";
    pub const AUTH_LOGOUT: &str = "auth.logout";

    pub const USER_INVITE: &str = "user.invite";
    pub const USER_INVITE_ACCEPT: &str = "user.invite.accept";
    pub const USER_ROLE_UPDATE: &str = "user.role.update";
    pub const USER_DEACTIVATE: &str = "user.deactivate";
    pub const USER_REACTIVATE: &str = "user.reactivate";

    pub const PROJECT_CREATE: &str = "project.create";
    pub const PROJECT_UPDATE: &str = "project.update";
    pub const PROJECT_ARCHIVE: &str = "project.archive";
    pub const PROJECT_UNARCHIVE: &str = "project.unarchive";
    pub const PROJECT_MEMBER_ADD: &str = "project.member.add";
    pub const PROJECT_MEMBER_REMOVE: &str = "project.member.remove";
    pub const PROJECT_MEMBER_UPDATE: &str = "project.member.update";

    pub const TASK_CREATE: &str = "task.create";
    pub const TASK_UPDATE: &str = "task.update";
    pub const TASK_DELETE: &str = "task.delete";
    pub const TASK_ASSIGN: &str = "task.assign";
    pub const TASK_UNASSIGN: &str = "task.unassign";
    pub const TASK_STATUS_UPDATE: &str = "task.status.update";
}

/// Entity types recorded on audit rows
pub mod entities {
    pub const ORGANIZATION: &str = "organization";
    pub const USER: &str = "user";
    pub const INVITE: &str = "invite";
    pub const PROJECT: &str = "project";
    pub const PROJECT_MEMBER: &str = "project_member";
    pub const TASK: &str = "task";
}

/// Append an audit event. Callers that must not fail on audit outages
/// should go through `api::audit::audit_log` instead.
pub async fn log_audit(
    db: &SqlitePool,
    org_id: &str,
    user_id: Option<&str>,
    action: &str,
    entity: &str,
    entity_id: Option<&str>,
    details: Option<serde_json::Value>,
) -> Result<(), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let details_json = details.map(|d| d.to_string());

    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, org_id, user_id, action, entity, entity_id, details, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(org_id)
    .bind(user_id)
    .bind(action)
    .bind(entity)
    .bind(entity_id)
    .bind(&details_json)
    .bind(&now)
    .execute(db)
    .await?;

    tracing::debug!(
        action = action,
        entity = entity,
        entity_id = entity_id,
        user_id = user_id,
        "Audit log recorded"
    );

    Ok(())
}
