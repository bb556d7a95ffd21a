//! Access-control gates.
//!
//! Three composable predicates run before protected operations: an
//! org-role check, a project-role check, and an admin-or-project-role
//! check. Gates are pure predicates over current state and are
//! re-evaluated on every request, so role changes take effect on the next
//! request. ADMIN is an org-wide super-role: it satisfies any
//! project-level requirement without a membership row, which lets admins
//! manage projects they never joined.

use sqlx::SqlitePool;

use crate::auth::AccessClaims;
use crate::db::{OrgRole, Project, ProjectMember, ProjectRole};
use crate::error::DomainError;

/// Pass iff the authenticated user's org role is in `allowed`
pub fn require_org_role(claims: &AccessClaims, allowed: &[OrgRole]) -> Result<(), DomainError> {
    if allowed.contains(&claims.role_enum()) {
        Ok(())
    } else {
        Err(DomainError::forbidden("Access denied"))
    }
}

/// Look up the caller's membership in a project and require one of the
/// given project roles. The resolved role is returned for downstream
/// checks (the workflow engine's members-touch-own-tasks rule).
pub async fn require_project_role(
    db: &SqlitePool,
    project_id: &str,
    user_id: &str,
    allowed: &[ProjectRole],
) -> Result<ProjectRole, DomainError> {
    let membership: Option<ProjectMember> =
        sqlx::query_as("SELECT * FROM project_members WHERE project_id = ? AND user_id = ?")
            .bind(project_id)
            .bind(user_id)
            .fetch_optional(db)
            .await?;

    let membership = membership.ok_or(DomainError::NotAProjectMember)?;
    let role = membership.role_enum();

    if allowed.contains(&role) {
        Ok(role)
    } else {
        Err(DomainError::forbidden("Insufficient project permissions"))
    }
}

/// Short-circuit to pass when the caller is an org ADMIN; otherwise
/// degrade to the project-role gate. Returns `None` for the admin path
/// (no membership row was consulted).
pub async fn require_admin_or_project_role(
    db: &SqlitePool,
    claims: &AccessClaims,
    project_id: &str,
    allowed: &[ProjectRole],
) -> Result<Option<ProjectRole>, DomainError> {
    if claims.role_enum() == OrgRole::Admin {
        return Ok(None);
    }

    let role = require_project_role(db, project_id, &claims.sub, allowed).await?;
    Ok(Some(role))
}

/// Load a project within the caller's org and reject it if archived.
/// Archived projects refuse every mutating sub-operation until
/// unarchived.
pub async fn ensure_project_active(
    db: &SqlitePool,
    org_id: &str,
    project_id: &str,
) -> Result<Project, DomainError> {
    let project: Option<Project> =
        sqlx::query_as("SELECT * FROM projects WHERE id = ? AND org_id = ?")
            .bind(project_id)
            .bind(org_id)
            .fetch_optional(db)
            .await?;

    let project = project.ok_or(DomainError::NotFound("Project"))?;

    if project.is_archived {
        return Err(DomainError::ProjectArchived);
    }

    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_util::{add_project_member, seed_org, seed_project, seed_user};

    fn claims_for(user_id: &str, org_id: &str, role: &str) -> AccessClaims {
        AccessClaims {
            sub: user_id.to_string(),
            org: org_id.to_string(),
            role: role.to_string(),
            iat: 0,
            exp: i64::MAX,
        }
    }

    #[test]
    fn org_gate_checks_allowed_roles() {
        let admin = claims_for("u1", "o1", "ADMIN");
        let member = claims_for("u2", "o1", "MEMBER");

        assert!(require_org_role(&admin, &[OrgRole::Admin]).is_ok());
        assert!(require_org_role(&member, &[OrgRole::Admin, OrgRole::Member]).is_ok());
        assert!(matches!(
            require_org_role(&member, &[OrgRole::Admin]),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn project_gate_resolves_membership_role() {
        let db = crate::db::init_in_memory().await.unwrap();
        let org = seed_org(&db, "acme").await;
        let admin = seed_user(&db, &org, "admin@acme.test", "ADMIN", true).await;
        let manager = seed_user(&db, &org, "mgr@acme.test", "MEMBER", true).await;
        let outsider = seed_user(&db, &org, "out@acme.test", "MEMBER", true).await;
        let project = seed_project(&db, &org, &admin, "launch").await;
        add_project_member(&db, &project, &manager, "MANAGER").await;

        let role = require_project_role(
            &db,
            &project.id,
            &manager.id,
            &[ProjectRole::Manager, ProjectRole::Member],
        )
        .await
        .unwrap();
        assert_eq!(role, ProjectRole::Manager);

        assert!(matches!(
            require_project_role(&db, &project.id, &outsider.id, &[ProjectRole::Member]).await,
            Err(DomainError::NotAProjectMember)
        ));

        assert!(matches!(
            require_project_role(&db, &project.id, &manager.id, &[ProjectRole::Member]).await,
            Err(DomainError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn admin_bypasses_project_membership() {
        let db = crate::db::init_in_memory().await.unwrap();
        let org = seed_org(&db, "acme").await;
        let admin = seed_user(&db, &org, "admin@acme.test", "ADMIN", true).await;
        let member = seed_user(&db, &org, "member@acme.test", "MEMBER", true).await;
        let project = seed_project(&db, &org, &admin, "launch").await;
        add_project_member(&db, &project, &member, "MEMBER").await;

        // Admin passes with no membership row
        let resolved = require_admin_or_project_role(
            &db,
            &claims_for(&admin.id, &org.id, "ADMIN"),
            &project.id,
            &[ProjectRole::Manager],
        )
        .await
        .unwrap();
        assert!(resolved.is_none());

        // Non-admin falls through to the membership lookup
        let resolved = require_admin_or_project_role(
            &db,
            &claims_for(&member.id, &org.id, "MEMBER"),
            &project.id,
            &[ProjectRole::Manager, ProjectRole::Member],
        )
        .await
        .unwrap();
        assert_eq!(resolved, Some(ProjectRole::Member));

        assert!(matches!(
            require_admin_or_project_role(
                &db,
                &claims_for(&member.id, &org.id, "MEMBER"),
                &project.id,
                &[ProjectRole::Manager],
            )
            .await,
            Err(DomainError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn archived_projects_are_rejected() {
        let db = crate::db::init_in_memory().await.unwrap();
        let org = seed_org(&db, "acme").await;
        let admin = seed_user(&db, &org, "admin@acme.test", "ADMIN", true).await;
        let project = seed_project(&db, &org, &admin, "launch").await;

        assert!(ensure_project_active(&db, &org.id, &project.id)
            .await
            .is_ok());

        sqlx::query("UPDATE projects SET is_archived = 1 WHERE id = ?")
            .bind(&project.id)
            .execute(&db)
            .await
            .unwrap();

        assert!(matches!(
            ensure_project_active(&db, &org.id, &project.id).await,
            Err(DomainError::ProjectArchived)
        ));

        // Projects outside the caller's org scope read as absent
        assert!(matches!(
            ensure_project_active(&db, "other-org", &project.id).await,
            Err(DomainError::NotFound(_))
        ));
    }
}
