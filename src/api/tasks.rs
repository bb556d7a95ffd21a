//! Task endpoints: lifecycle, assignment, and status transitions.
//!
//! Every mutation re-checks the task's current status first: a DONE task
//! is frozen in full, not just its status field.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::access::{ensure_project_active, require_admin_or_project_role};
use crate::db::{
    actions, entities, AssignTaskRequest, CreateTaskRequest, MessageResponse, PageMeta, PageQuery,
    Paginated, ProjectRole, Task, TaskStatus, TaskWithNames, TaskWithProject,
    UpdateTaskRequest, UpdateTaskStatusRequest,
};
use crate::error::DomainError;
use crate::workflow::{authorize_status_change, ensure_task_mutable};
use crate::AppState;

use super::audit::audit_log;
use super::auth::AuthUser;
use super::error::ApiError;
use super::validation::{validate_name, validate_uuid};

async fn fetch_task(
    state: &AppState,
    org_id: &str,
    project_id: &str,
    task_id: &str,
) -> Result<Task, ApiError> {
    let task: Option<Task> =
        sqlx::query_as("SELECT * FROM tasks WHERE id = ? AND project_id = ? AND org_id = ?")
            .bind(task_id)
            .bind(project_id)
            .bind(org_id)
            .fetch_optional(&state.db)
            .await?;

    task.ok_or_else(|| ApiError::not_found("Task not found"))
}

/// Verify an assignee candidate: active, same org, and already a member
/// of the task's project.
async fn check_assignee(
    state: &AppState,
    org_id: &str,
    project_id: &str,
    user_id: &str,
) -> Result<(), ApiError> {
    let target: Option<(String,)> =
        sqlx::query_as("SELECT id FROM users WHERE id = ? AND org_id = ? AND is_active = 1")
            .bind(user_id)
            .bind(org_id)
            .fetch_optional(&state.db)
            .await?;
    if target.is_none() {
        return Err(ApiError::not_found("User not found in this organization"));
    }

    let membership: Option<(String,)> =
        sqlx::query_as("SELECT id FROM project_members WHERE project_id = ? AND user_id = ?")
            .bind(project_id)
            .bind(user_id)
            .fetch_optional(&state.db)
            .await?;
    if membership.is_none() {
        return Err(ApiError::from(DomainError::UserNotProjectMember));
    }

    Ok(())
}

/// Create a task in TODO status
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    user: AuthUser,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    if let Err(e) = validate_uuid(&project_id, "project_id") {
        return Err(ApiError::validation_field("project_id", e));
    }
    validate_name(&req.title, "Task title", 500).map_err(|e| ApiError::validation_field("title", e))?;

    require_admin_or_project_role(&state.db, &user.claims, &project_id, &[ProjectRole::Manager])
        .await?;
    ensure_project_active(&state.db, user.org_id(), &project_id).await?;

    if let Some(ref assignee) = req.assigned_to {
        check_assignee(&state, user.org_id(), &project_id, assignee).await?;
    }

    let task_id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO tasks (id, org_id, project_id, title, description, status, priority, due_date, assigned_to, created_by, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 'TODO', ?, ?, ?, ?, ?, ?)",
    )
    .bind(&task_id)
    .bind(user.org_id())
    .bind(&project_id)
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(req.priority.unwrap_or(3))
    .bind(&req.due_date)
    .bind(&req.assigned_to)
    .bind(user.user_id())
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let task = fetch_task(&state, user.org_id(), &project_id, &task_id).await?;

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::TASK_CREATE,
        entities::TASK,
        Some(&task_id),
        Some(serde_json::json!({ "project_id": project_id, "title": task.title })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(task)))
}

/// List a project's tasks with assignee and creator names
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    user: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<TaskWithNames>>, ApiError> {
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

    let tasks: Vec<TaskWithNames> = sqlx::query_as(
        r#"
        SELECT t.id, t.project_id, t.title, t.description, t.status, t.priority,
               t.due_date, t.assigned_to, assignee.name AS assigned_to_name,
               t.created_by, creator.name AS created_by_name,
               t.created_at, t.updated_at
        FROM tasks t
        LEFT JOIN users assignee ON assignee.id = t.assigned_to
        LEFT JOIN users creator ON creator.id = t.created_by
        WHERE t.project_id = ? AND t.org_id = ?
        ORDER BY t.created_at DESC
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
        data: tasks,
        meta: PageMeta { limit, offset },
    }))
}

/// Get a task by id
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path((project_id, task_id)): Path<(String, String)>,
    user: AuthUser,
) -> Result<Json<TaskWithNames>, ApiError> {
    if let Err(e) = validate_uuid(&task_id, "task_id") {
        return Err(ApiError::validation_field("task_id", e));
    }

    require_admin_or_project_role(
        &state.db,
        &user.claims,
        &project_id,
        &[ProjectRole::Manager, ProjectRole::Member],
    )
    .await?;

    let task: Option<TaskWithNames> = sqlx::query_as(
        r#"
        SELECT t.id, t.project_id, t.title, t.description, t.status, t.priority,
               t.due_date, t.assigned_to, assignee.name AS assigned_to_name,
               t.created_by, creator.name AS created_by_name,
               t.created_at, t.updated_at
        FROM tasks t
        LEFT JOIN users assignee ON assignee.id = t.assigned_to
        LEFT JOIN users creator ON creator.id = t.created_by
        WHERE t.id = ? AND t.project_id = ? AND t.org_id = ?
        "#,
    )
    .bind(&task_id)
    .bind(&project_id)
    .bind(user.org_id())
    .fetch_optional(&state.db)
    .await?;

    task.map(Json)
        .ok_or_else(|| ApiError::not_found("Task not found"))
}

/// Update task fields (not status). Rejected outright once the task is
/// DONE.
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path((project_id, task_id)): Path<(String, String)>,
    user: AuthUser,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    if let Err(e) = validate_uuid(&task_id, "task_id") {
        return Err(ApiError::validation_field("task_id", e));
    }

    if req.title.is_none()
        && req.description.is_none()
        && req.priority.is_none()
        && req.due_date.is_none()
    {
        return Err(ApiError::bad_request(
            "At least one field is required to update",
        ));
    }
    if let Some(ref title) = req.title {
        validate_name(title, "Task title", 500)
            .map_err(|e| ApiError::validation_field("title", e))?;
    }

    require_admin_or_project_role(&state.db, &user.claims, &project_id, &[ProjectRole::Manager])
        .await?;
    ensure_project_active(&state.db, user.org_id(), &project_id).await?;

    let task = fetch_task(&state, user.org_id(), &project_id, &task_id).await?;
    ensure_task_mutable(task.status_enum()).map_err(ApiError::from)?;

    sqlx::query(
        "UPDATE tasks SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            priority = COALESCE(?, priority),
            due_date = COALESCE(?, due_date),
            updated_at = ?
         WHERE id = ? AND project_id = ? AND org_id = ?",
    )
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.priority)
    .bind(&req.due_date)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(&task_id)
    .bind(&project_id)
    .bind(user.org_id())
    .execute(&state.db)
    .await?;

    let task = fetch_task(&state, user.org_id(), &project_id, &task_id).await?;

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::TASK_UPDATE,
        entities::TASK,
        Some(&task_id),
        Some(serde_json::json!({ "project_id": project_id, "title": task.title })),
    )
    .await;

    Ok(Json(task))
}

/// Delete a task. Completed tasks cannot be deleted either; the audit
/// entry keeps the title after the row is gone.
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path((project_id, task_id)): Path<(String, String)>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Err(e) = validate_uuid(&task_id, "task_id") {
        return Err(ApiError::validation_field("task_id", e));
    }

    require_admin_or_project_role(&state.db, &user.claims, &project_id, &[ProjectRole::Manager])
        .await?;
    ensure_project_active(&state.db, user.org_id(), &project_id).await?;

    let task = fetch_task(&state, user.org_id(), &project_id, &task_id).await?;
    ensure_task_mutable(task.status_enum()).map_err(ApiError::from)?;

    sqlx::query("DELETE FROM tasks WHERE id = ? AND project_id = ? AND org_id = ?")
        .bind(&task_id)
        .bind(&project_id)
        .bind(user.org_id())
        .execute(&state.db)
        .await?;

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::TASK_DELETE,
        entities::TASK,
        Some(&task_id),
        Some(serde_json::json!({ "project_id": project_id, "title": task.title })),
    )
    .await;

    Ok(Json(MessageResponse::new("Task deleted successfully")))
}

/// Assign a task to a project member
pub async fn assign_task(
    State(state): State<Arc<AppState>>,
    Path((project_id, task_id)): Path<(String, String)>,
    user: AuthUser,
    Json(req): Json<AssignTaskRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Err(e) = validate_uuid(&task_id, "task_id") {
        return Err(ApiError::validation_field("task_id", e));
    }
    if req.user_id.is_empty() {
        return Err(ApiError::bad_request("userId is required"));
    }

    require_admin_or_project_role(&state.db, &user.claims, &project_id, &[ProjectRole::Manager])
        .await?;
    ensure_project_active(&state.db, user.org_id(), &project_id).await?;

    let task = fetch_task(&state, user.org_id(), &project_id, &task_id).await?;
    ensure_task_mutable(task.status_enum()).map_err(ApiError::from)?;

    check_assignee(&state, user.org_id(), &project_id, &req.user_id).await?;

    sqlx::query(
        "UPDATE tasks SET assigned_to = ?, updated_at = ? WHERE id = ? AND project_id = ? AND org_id = ?",
    )
    .bind(&req.user_id)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(&task_id)
    .bind(&project_id)
    .bind(user.org_id())
    .execute(&state.db)
    .await?;

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::TASK_ASSIGN,
        entities::TASK,
        Some(&task_id),
        Some(serde_json::json!({ "project_id": project_id, "assigned_to": req.user_id })),
    )
    .await;

    Ok(Json(MessageResponse::new("Task assigned successfully")))
}

/// Clear a task's assignee
pub async fn unassign_task(
    State(state): State<Arc<AppState>>,
    Path((project_id, task_id)): Path<(String, String)>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Err(e) = validate_uuid(&task_id, "task_id") {
        return Err(ApiError::validation_field("task_id", e));
    }

    require_admin_or_project_role(&state.db, &user.claims, &project_id, &[ProjectRole::Manager])
        .await?;
    ensure_project_active(&state.db, user.org_id(), &project_id).await?;

    let task = fetch_task(&state, user.org_id(), &project_id, &task_id).await?;
    ensure_task_mutable(task.status_enum()).map_err(ApiError::from)?;

    sqlx::query(
        "UPDATE tasks SET assigned_to = NULL, updated_at = ? WHERE id = ? AND project_id = ? AND org_id = ?",
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(&task_id)
    .bind(&project_id)
    .bind(user.org_id())
    .execute(&state.db)
    .await?;

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::TASK_UNASSIGN,
        entities::TASK,
        Some(&task_id),
        Some(serde_json::json!({ "project_id": project_id, "title": task.title })),
    )
    .await;

    Ok(Json(MessageResponse::new("Task unassigned successfully")))
}

/// Move a task through the workflow. The full rule chain runs in the
/// workflow engine: terminal check, transition whitelist, then the
/// members-touch-own-tasks rule using the gate's resolved role.
pub async fn update_task_status(
    State(state): State<Arc<AppState>>,
    Path((project_id, task_id)): Path<(String, String)>,
    user: AuthUser,
    Json(req): Json<UpdateTaskStatusRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Err(e) = validate_uuid(&task_id, "task_id") {
        return Err(ApiError::validation_field("task_id", e));
    }
    if req.status.is_empty() {
        return Err(ApiError::bad_request("status is required"));
    }
    let requested: TaskStatus = req
        .status
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid status"))?;

    let project_role = require_admin_or_project_role(
        &state.db,
        &user.claims,
        &project_id,
        &[ProjectRole::Manager, ProjectRole::Member],
    )
    .await?;
    ensure_project_active(&state.db, user.org_id(), &project_id).await?;

    let task = fetch_task(&state, user.org_id(), &project_id, &task_id).await?;

    authorize_status_change(
        task.status_enum(),
        requested,
        task.assigned_to.as_deref(),
        user.user_id(),
        user.org_role(),
        project_role,
    )
    .map_err(ApiError::from)?;

    sqlx::query(
        "UPDATE tasks SET status = ?, updated_at = ? WHERE id = ? AND project_id = ? AND org_id = ?",
    )
    .bind(requested.to_string())
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(&task_id)
    .bind(&project_id)
    .bind(user.org_id())
    .execute(&state.db)
    .await?;

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::TASK_STATUS_UPDATE,
        entities::TASK,
        Some(&task_id),
        Some(serde_json::json!({
            "project_id": project_id,
            "from": task.status,
            "to": requested.to_string(),
        })),
    )
    .await;

    Ok(Json(MessageResponse::new(
        "Task status updated successfully",
    )))
}

/// Tasks assigned to the caller across all non-archived projects
pub async fn my_tasks(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<TaskWithProject>>, ApiError> {
    let tasks: Vec<TaskWithProject> = sqlx::query_as(
        r#"
        SELECT t.id, t.project_id, p.name AS project_name, t.title, t.description,
               t.status, t.priority, t.due_date, t.created_at, t.updated_at
        FROM tasks t
        JOIN projects p ON p.id = t.project_id
        WHERE t.assigned_to = ? AND t.org_id = ? AND p.is_archived = 0
        ORDER BY t.due_date ASC
        "#,
    )
    .bind(user.user_id())
    .bind(user.org_id())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(tasks))
}
