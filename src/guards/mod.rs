//! Membership guards protecting the two role invariants: every
//! organization keeps at least one active ADMIN, and every non-empty
//! project keeps at least one MANAGER.
//!
//! Both guards are count-then-decide and do not lock. Callers run them on
//! the same connection as the subsequent write (inside the write's
//! transaction) and must re-check row existence afterwards.

use sqlx::SqliteConnection;

use crate::error::DomainError;

/// Fail when `candidate_user_id` is the organization's only remaining
/// active admin. Must run before demoting an admin to MEMBER or
/// deactivating an admin.
pub async fn ensure_not_last_admin(
    conn: &mut SqliteConnection,
    org_id: &str,
    candidate_user_id: &str,
) -> Result<(), DomainError> {
    let (admin_count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM users WHERE org_id = ? AND role = 'ADMIN' AND is_active = 1",
    )
    .bind(org_id)
    .fetch_one(&mut *conn)
    .await?;

    if admin_count == 1 {
        let last_admin: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM users WHERE org_id = ? AND role = 'ADMIN' AND is_active = 1",
        )
        .bind(org_id)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some((id,)) = last_admin {
            if id == candidate_user_id {
                return Err(DomainError::CannotRemoveLastAdmin);
            }
        }
    }

    Ok(())
}

/// Fail when `candidate_user_id` holds the project's only MANAGER
/// membership. Must run before demoting a manager to MEMBER or removing
/// a manager from the project.
pub async fn ensure_not_last_manager(
    conn: &mut SqliteConnection,
    project_id: &str,
    candidate_user_id: &str,
) -> Result<(), DomainError> {
    let (manager_count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM project_members WHERE project_id = ? AND role = 'MANAGER'",
    )
    .bind(project_id)
    .fetch_one(&mut *conn)
    .await?;

    if manager_count == 1 {
        let last_manager: Option<(String,)> = sqlx::query_as(
            "SELECT user_id FROM project_members WHERE project_id = ? AND role = 'MANAGER'",
        )
        .bind(project_id)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some((user_id,)) = last_manager {
            if user_id == candidate_user_id {
                return Err(DomainError::CannotRemoveLastManager);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_util::{add_project_member, seed_org, seed_project, seed_user};

    #[tokio::test]
    async fn sole_admin_is_protected() {
        let db = crate::db::init_in_memory().await.unwrap();
        let org = seed_org(&db, "acme").await;
        let admin = seed_user(&db, &org, "admin@acme.test", "ADMIN", true).await;
        let member = seed_user(&db, &org, "member@acme.test", "MEMBER", true).await;

        let mut conn = db.acquire().await.unwrap();

        assert!(matches!(
            ensure_not_last_admin(&mut conn, &org.id, &admin.id).await,
            Err(DomainError::CannotRemoveLastAdmin)
        ));

        // The guard applies per target: a non-admin candidate passes even
        // when only one admin exists
        assert!(ensure_not_last_admin(&mut conn, &org.id, &member.id)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn second_active_admin_lifts_protection() {
        let db = crate::db::init_in_memory().await.unwrap();
        let org = seed_org(&db, "acme").await;
        let a1 = seed_user(&db, &org, "a1@acme.test", "ADMIN", true).await;
        let a2 = seed_user(&db, &org, "a2@acme.test", "ADMIN", true).await;

        let mut conn = db.acquire().await.unwrap();
        assert!(ensure_not_last_admin(&mut conn, &org.id, &a1.id).await.is_ok());
        assert!(ensure_not_last_admin(&mut conn, &org.id, &a2.id).await.is_ok());
    }

    #[tokio::test]
    async fn deactivated_admins_do_not_count() {
        let db = crate::db::init_in_memory().await.unwrap();
        let org = seed_org(&db, "acme").await;
        let live = seed_user(&db, &org, "live@acme.test", "ADMIN", true).await;
        let _gone = seed_user(&db, &org, "gone@acme.test", "ADMIN", false).await;

        let mut conn = db.acquire().await.unwrap();
        assert!(matches!(
            ensure_not_last_admin(&mut conn, &org.id, &live.id).await,
            Err(DomainError::CannotRemoveLastAdmin)
        ));
    }

    #[tokio::test]
    async fn admin_counts_are_scoped_per_org() {
        let db = crate::db::init_in_memory().await.unwrap();
        let org_a = seed_org(&db, "acme").await;
        let org_b = seed_org(&db, "globex").await;
        let admin_a = seed_user(&db, &org_a, "a@acme.test", "ADMIN", true).await;
        let _admin_b = seed_user(&db, &org_b, "b@globex.test", "ADMIN", true).await;

        let mut conn = db.acquire().await.unwrap();
        assert!(matches!(
            ensure_not_last_admin(&mut conn, &org_a.id, &admin_a.id).await,
            Err(DomainError::CannotRemoveLastAdmin)
        ));
    }

    #[tokio::test]
    async fn sole_manager_is_protected() {
        let db = crate::db::init_in_memory().await.unwrap();
        let org = seed_org(&db, "acme").await;
        let admin = seed_user(&db, &org, "admin@acme.test", "ADMIN", true).await;
        let m1 = seed_user(&db, &org, "m1@acme.test", "MEMBER", true).await;
        let m2 = seed_user(&db, &org, "m2@acme.test", "MEMBER", true).await;
        let project = seed_project(&db, &org, &admin, "launch").await;
        add_project_member(&db, &project, &m1, "MANAGER").await;
        add_project_member(&db, &project, &m2, "MEMBER").await;

        let mut conn = db.acquire().await.unwrap();

        assert!(matches!(
            ensure_not_last_manager(&mut conn, &project.id, &m1.id).await,
            Err(DomainError::CannotRemoveLastManager)
        ));

        // Plain members can always be removed
        assert!(ensure_not_last_manager(&mut conn, &project.id, &m2.id)
            .await
            .is_ok());

        // A second manager lifts the protection
        sqlx::query("UPDATE project_members SET role = 'MANAGER' WHERE project_id = ? AND user_id = ?")
            .bind(&project.id)
            .bind(&m2.id)
            .execute(&mut *conn)
            .await
            .unwrap();
        assert!(ensure_not_last_manager(&mut conn, &project.id, &m1.id)
            .await
            .is_ok());
    }
}
