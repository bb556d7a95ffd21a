//! Audit log endpoints and the best-effort append helper.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::access::require_admin_or_project_role;
use crate::db::{log_audit, AuditLogWithUser, OrgRole, ProjectRole};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::validation::validate_uuid;

/// Append an audit event without failing the caller. Write failures are
/// logged and dropped; an audit outage never blocks the operation itself.
pub async fn audit_log(
    state: &AppState,
    org_id: &str,
    user_id: Option<&str>,
    action: &str,
    entity: &str,
    entity_id: Option<&str>,
    details: Option<serde_json::Value>,
) {
    if let Err(e) = log_audit(&state.db, org_id, user_id, action, entity, entity_id, details).await
    {
        tracing::warn!(
            action = action,
            entity = entity,
            error = %e,
            "Failed to create audit log entry"
        );
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

/// Recent activity. Admins see the whole organization's trail; members
/// see their own actions only.
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogWithUser>>, ApiError> {
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let logs: Vec<AuditLogWithUser> = if user.org_role() == OrgRole::Admin {
        sqlx::query_as(
            r#"
            SELECT a.id, a.action, a.entity, a.entity_id, a.details, a.created_at,
                   u.name AS user_name
            FROM audit_logs a
            LEFT JOIN users u ON u.id = a.user_id
            WHERE a.org_id = ?
            ORDER BY a.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user.org_id())
        .bind(limit)
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as(
            r#"
            SELECT a.id, a.action, a.entity, a.entity_id, a.details, a.created_at,
                   u.name AS user_name
            FROM audit_logs a
            LEFT JOIN users u ON u.id = a.user_id
            WHERE a.org_id = ? AND a.user_id = ?
            ORDER BY a.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user.org_id())
        .bind(user.user_id())
        .fetch_all(&state.db)
        .await?
    };

    Ok(Json(logs))
}

/// A single project's activity, filtered on the project id recorded in
/// each entry's details payload.
pub async fn list_project_logs(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    user: AuthUser,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogWithUser>>, ApiError> {
    if let Err(e) = validate_uuid(&project_id, "project_id") {
        return Err(ApiError::validation_field("project_id", e));
    }

    require_admin_or_project_role(
        &state.db,
        &user.claims,
        &project_id,
        &[ProjectRole::Manager, ProjectRole::Member],
    )
    .await?;

    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let logs: Vec<AuditLogWithUser> = sqlx::query_as(
        r#"
        SELECT a.id, a.action, a.entity, a.entity_id, a.details, a.created_at,
               u.name AS user_name
        FROM audit_logs a
        LEFT JOIN users u ON u.id = a.user_id
        WHERE a.org_id = ? AND json_extract(a.details, '$.project_id') = ?
        ORDER BY a.created_at DESC
        LIMIT ?
        "#,
    )
    .bind(user.org_id())
    .bind(&project_id)
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(logs))
}
