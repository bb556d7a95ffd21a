//! Project endpoints: lifecycle, archival, and membership.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::access::{ensure_project_active, require_admin_or_project_role, require_org_role};
use crate::db::{
    actions, entities, AddProjectMemberRequest, CreateProjectRequest, MessageResponse, OrgRole,
    PageMeta, PageQuery, Paginated, Project, ProjectMemberWithUser, ProjectRole,
    ProjectWithMemberCount, UpdateProjectMemberRoleRequest, UpdateProjectRequest,
};
use crate::guards::ensure_not_last_manager;
use crate::AppState;

use super::audit::audit_log;
use super::auth::AuthUser;
use super::error::ApiError;
use super::validation::{validate_name, validate_uuid};

fn validate_project_role(role: &str) -> Result<ProjectRole, ApiError> {
    role.parse::<ProjectRole>().map_err(|_| {
        ApiError::validation_field("role", "Invalid role. Must be MANAGER or MEMBER")
    })
}

/// Create a project. The creator becomes its first MANAGER in the same
/// transaction, so a project is never observable without a manager.
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    require_org_role(&user.claims, &[OrgRole::Admin])?;

    validate_name(&req.name, "Project name", 200)
        .map_err(|e| ApiError::validation_field("name", e))?;

    let project_id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;

    sqlx::query(
        "INSERT INTO projects (id, org_id, name, description, is_archived, created_by, created_at, updated_at)
         VALUES (?, ?, ?, ?, 0, ?, ?, ?)",
    )
    .bind(&project_id)
    .bind(user.org_id())
    .bind(req.name.trim())
    .bind(&req.description)
    .bind(user.user_id())
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO project_members (id, project_id, user_id, role, created_at)
         VALUES (?, ?, ?, 'MANAGER', ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&project_id)
    .bind(user.user_id())
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let project: Project = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
        .bind(&project_id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(project = %project.name, "Created project");

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::PROJECT_CREATE,
        entities::PROJECT,
        Some(&project_id),
        Some(serde_json::json!({ "project_id": project_id, "name": project.name })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(project)))
}

/// List projects: admins see every project in the org, members only the
/// projects they belong to.
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<ProjectWithMemberCount>>, ApiError> {
    let (limit, offset) = page.clamp();

    let rows: Vec<ProjectWithMemberCount> = if user.org_role() == OrgRole::Admin {
        sqlx::query_as(
            r#"
            SELECT p.id, p.name, p.description, p.is_archived, p.created_by,
                   COALESCE(u.name, '') AS created_by_name, p.created_at,
                   (SELECT COUNT(*) FROM project_members pm WHERE pm.project_id = p.id) AS member_count
            FROM projects p
            LEFT JOIN users u ON u.id = p.created_by
            WHERE p.org_id = ?
            ORDER BY p.created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user.org_id())
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as(
            r#"
            SELECT p.id, p.name, p.description, p.is_archived, p.created_by,
                   COALESCE(u.name, '') AS created_by_name, p.created_at,
                   (SELECT COUNT(*) FROM project_members pm WHERE pm.project_id = p.id) AS member_count
            FROM projects p
            INNER JOIN project_members mine ON mine.project_id = p.id AND mine.user_id = ?
            LEFT JOIN users u ON u.id = p.created_by
            WHERE p.org_id = ?
            ORDER BY p.created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user.user_id())
        .bind(user.org_id())
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db)
        .await?
    };

    Ok(Json(Paginated {
        data: rows,
        meta: PageMeta { limit, offset },
    }))
}

/// Get a project by id, scoped to the caller's org
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    user: AuthUser,
) -> Result<Json<Project>, ApiError> {
    if let Err(e) = validate_uuid(&project_id, "project_id") {
        return Err(ApiError::validation_field("project_id", e));
    }

    let project: Option<Project> =
        sqlx::query_as("SELECT * FROM projects WHERE id = ? AND org_id = ?")
            .bind(&project_id)
            .bind(user.org_id())
            .fetch_optional(&state.db)
            .await?;

    project
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Project not found"))
}

/// Update a project's name or description
pub async fn update_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    user: AuthUser,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    require_org_role(&user.claims, &[OrgRole::Admin])?;

    if let Err(e) = validate_uuid(&project_id, "project_id") {
        return Err(ApiError::validation_field("project_id", e));
    }

    if req.name.is_none() && req.description.is_none() {
        return Err(ApiError::bad_request("At least one field is required"));
    }
    if let Some(ref name) = req.name {
        validate_name(name, "Project name", 200)
            .map_err(|e| ApiError::validation_field("name", e))?;
    }

    let result = sqlx::query(
        "UPDATE projects SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            updated_at = ?
         WHERE id = ? AND org_id = ?",
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(&project_id)
    .bind(user.org_id())
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Project not found"));
    }

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::PROJECT_UPDATE,
        entities::PROJECT,
        Some(&project_id),
        Some(serde_json::json!({ "project_id": project_id })),
    )
    .await;

    let project: Project = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
        .bind(&project_id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(project))
}

async fn set_archived(
    state: &AppState,
    user: &AuthUser,
    project_id: &str,
    archived: bool,
) -> Result<Json<MessageResponse>, ApiError> {
    require_org_role(&user.claims, &[OrgRole::Admin])?;

    if let Err(e) = validate_uuid(project_id, "project_id") {
        return Err(ApiError::validation_field("project_id", e));
    }

    let result = sqlx::query(
        "UPDATE projects SET is_archived = ?, updated_at = ? WHERE id = ? AND org_id = ?",
    )
    .bind(archived)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(project_id)
    .bind(user.org_id())
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Project not found"));
    }

    let (action, message) = if archived {
        (actions::PROJECT_ARCHIVE, "Project archived")
    } else {
        (actions::PROJECT_UNARCHIVE, "Project unarchived")
    };

    audit_log(
        state,
        user.org_id(),
        Some(user.user_id()),
        action,
        entities::PROJECT,
        Some(project_id),
        Some(serde_json::json!({ "project_id": project_id })),
    )
    .await;

    Ok(Json(MessageResponse::new(message)))
}

/// Archive a project. All mutating sub-operations are rejected until it
/// is unarchived; archival is reversible.
pub async fn archive_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    set_archived(&state, &user, &project_id, true).await
}

pub async fn unarchive_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    set_archived(&state, &user, &project_id, false).await
}

/// Add an org user to a project. The target must be an active user of
/// the same org; re-adding an existing member is a no-op.
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    user: AuthUser,
    Json(req): Json<AddProjectMemberRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    if let Err(e) = validate_uuid(&project_id, "project_id") {
        return Err(ApiError::validation_field("project_id", e));
    }
    let role = validate_project_role(&req.role)?;

    require_admin_or_project_role(&state.db, &user.claims, &project_id, &[ProjectRole::Manager])
        .await?;
    ensure_project_active(&state.db, user.org_id(), &project_id).await?;

    let target: Option<(String,)> =
        sqlx::query_as("SELECT id FROM users WHERE id = ? AND org_id = ? AND is_active = 1")
            .bind(&req.user_id)
            .bind(user.org_id())
            .fetch_optional(&state.db)
            .await?;
    if target.is_none() {
        return Err(ApiError::not_found("User not found in this organization"));
    }

    sqlx::query(
        "INSERT INTO project_members (id, project_id, user_id, role, created_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT (project_id, user_id) DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&project_id)
    .bind(&req.user_id)
    .bind(role.to_string())
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::PROJECT_MEMBER_ADD,
        entities::PROJECT_MEMBER,
        Some(&req.user_id),
        Some(serde_json::json!({ "project_id": project_id, "role": role.to_string() })),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User added to the project")),
    ))
}

/// List a project's members with user details
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    user: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<ProjectMemberWithUser>>, ApiError> {
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

    let (limit, offset) = page.clamp();

    let members: Vec<ProjectMemberWithUser> = sqlx::query_as(
        r#"
        SELECT u.id AS user_id, u.email, u.name, pm.role, u.is_active
        FROM project_members pm
        JOIN users u ON u.id = pm.user_id
        WHERE pm.project_id = ? AND u.org_id = ?
        ORDER BY pm.created_at ASC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(&project_id)
    .bind(user.org_id())
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(Paginated {
        data: members,
        meta: PageMeta { limit, offset },
    }))
}

/// Change a member's project role. Demoting a manager runs the
/// last-manager guard inside the update transaction.
pub async fn update_member_role(
    State(state): State<Arc<AppState>>,
    Path((project_id, member_id)): Path<(String, String)>,
    user: AuthUser,
    Json(req): Json<UpdateProjectMemberRoleRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Err(e) = validate_uuid(&project_id, "project_id") {
        return Err(ApiError::validation_field("project_id", e));
    }
    if let Err(e) = validate_uuid(&member_id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }
    let new_role = validate_project_role(&req.role)?;

    require_admin_or_project_role(&state.db, &user.claims, &project_id, &[ProjectRole::Manager])
        .await?;
    ensure_project_active(&state.db, user.org_id(), &project_id).await?;

    let mut tx = state.db.begin().await?;

    if new_role == ProjectRole::Member {
        ensure_not_last_manager(&mut *tx, &project_id, &member_id)
            .await
            .map_err(ApiError::from)?;
    }

    let result = sqlx::query(
        "UPDATE project_members SET role = ? WHERE project_id = ? AND user_id = ?",
    )
    .bind(new_role.to_string())
    .bind(&project_id)
    .bind(&member_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Project member not found"));
    }

    tx.commit().await?;

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::PROJECT_MEMBER_UPDATE,
        entities::PROJECT_MEMBER,
        Some(&member_id),
        Some(serde_json::json!({ "project_id": project_id, "role": new_role.to_string() })),
    )
    .await;

    Ok(Json(MessageResponse::new("Project member role updated")))
}

/// Remove a member from a project. The last-manager guard runs inside
/// the delete transaction.
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Path((project_id, member_id)): Path<(String, String)>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Err(e) = validate_uuid(&project_id, "project_id") {
        return Err(ApiError::validation_field("project_id", e));
    }
    if let Err(e) = validate_uuid(&member_id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    require_admin_or_project_role(&state.db, &user.claims, &project_id, &[ProjectRole::Manager])
        .await?;
    ensure_project_active(&state.db, user.org_id(), &project_id).await?;

    let mut tx = state.db.begin().await?;

    ensure_not_last_manager(&mut *tx, &project_id, &member_id)
        .await
        .map_err(ApiError::from)?;

    let result = sqlx::query("DELETE FROM project_members WHERE project_id = ? AND user_id = ?")
        .bind(&project_id)
        .bind(&member_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Project member not found"));
    }

    tx.commit().await?;

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::PROJECT_MEMBER_REMOVE,
        entities::PROJECT_MEMBER,
        Some(&member_id),
        Some(serde_json::json!({ "project_id": project_id })),
    )
    .await;

    Ok(Json(MessageResponse::new("Member removed from the project")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_role_strings_parse_strictly() {
        assert!(validate_project_role("MANAGER").is_ok());
        assert!(validate_project_role("member").is_ok());
        assert!(validate_project_role("ADMIN").is_err());
        assert!(validate_project_role("").is_err());
    }
}
