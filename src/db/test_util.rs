//! Seed helpers shared by unit tests.

use super::{DbPool, Organization, Project, Task, User};
use chrono::Utc;
use uuid::Uuid;

pub async fn seed_org(db: &DbPool, slug: &str) -> Organization {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO organizations (id, name, slug, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(slug)
    .bind(slug)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await
    .unwrap();

    sqlx::query_as("SELECT * FROM organizations WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await
        .unwrap()
}

pub async fn seed_user(
    db: &DbPool,
    org: &Organization,
    email: &str,
    role: &str,
    active: bool,
) -> User {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO users (id, org_id, email, password_hash, name, role, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&org.id)
    .bind(email)
    .bind("$argon2id$test")
    .bind(email.split('@').next().unwrap())
    .bind(role)
    .bind(active)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await
    .unwrap();

    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await
        .unwrap()
}

pub async fn seed_project(db: &DbPool, org: &Organization, creator: &User, name: &str) -> Project {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO projects (id, org_id, name, description, is_archived, created_by, created_at, updated_at)
         VALUES (?, ?, ?, NULL, 0, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&org.id)
    .bind(name)
    .bind(&creator.id)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await
    .unwrap();

    sqlx::query_as("SELECT * FROM projects WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await
        .unwrap()
}

pub async fn add_project_member(db: &DbPool, project: &Project, user: &User, role: &str) {
    sqlx::query(
        "INSERT INTO project_members (id, project_id, user_id, role, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&project.id)
    .bind(&user.id)
    .bind(role)
    .bind(Utc::now().to_rfc3339())
    .execute(db)
    .await
    .unwrap();
}

pub async fn seed_task(
    db: &DbPool,
    project: &Project,
    creator: &User,
    title: &str,
    status: &str,
    assigned_to: Option<&str>,
) -> Task {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO tasks (id, org_id, project_id, title, description, status, priority, due_date, assigned_to, created_by, created_at, updated_at)
         VALUES (?, ?, ?, ?, NULL, ?, 3, NULL, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&project.org_id)
    .bind(&project.id)
    .bind(title)
    .bind(status)
    .bind(assigned_to)
    .bind(&creator.id)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await
    .unwrap();

    sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await
        .unwrap()
}
