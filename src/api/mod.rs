pub mod audit;
pub mod auth;
pub mod error;
mod projects;
mod tasks;
mod users;
mod validation;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes; /me is the only one needing a bearer token
    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_routes)
        // Users & invites
        .route("/users", get(users::list_users))
        .route("/users/invite", post(users::create_invite))
        .route("/users/accept-invite", post(users::accept_invite))
        .route("/users/:user_id/role", patch(users::update_user_role))
        .route("/users/:user_id/deactivate", patch(users::deactivate_user))
        .route("/users/:user_id/reactivate", patch(users::reactivate_user))
        // Projects
        .route(
            "/projects",
            post(projects::create_project).get(projects::list_projects),
        )
        .route(
            "/projects/:project_id",
            get(projects::get_project).patch(projects::update_project),
        )
        .route(
            "/projects/:project_id/archive",
            patch(projects::archive_project),
        )
        .route(
            "/projects/:project_id/unarchive",
            patch(projects::unarchive_project),
        )
        // Project membership
        .route(
            "/projects/:project_id/members",
            post(projects::add_member).get(projects::list_members),
        )
        .route(
            "/projects/:project_id/members/:user_id",
            patch(projects::update_member_role).delete(projects::remove_member),
        )
        // Tasks
        .route(
            "/projects/:project_id/tasks",
            post(tasks::create_task).get(tasks::list_tasks),
        )
        .route(
            "/projects/:project_id/tasks/:task_id",
            get(tasks::get_task)
                .patch(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route(
            "/projects/:project_id/tasks/:task_id/assign",
            patch(tasks::assign_task),
        )
        .route(
            "/projects/:project_id/tasks/:task_id/unassign",
            patch(tasks::unassign_task),
        )
        .route(
            "/projects/:project_id/tasks/:task_id/status",
            patch(tasks::update_task_status),
        )
        // Audit trail
        .route("/audit-logs", get(audit::list_logs))
        .route(
            "/projects/:project_id/audit-logs",
            get(audit::list_project_logs),
        )
        .route("/tasks/my-tasks", get(tasks::my_tasks))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
