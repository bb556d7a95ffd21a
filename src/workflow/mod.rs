//! Task status workflow.
//!
//! The lifecycle is a strict whitelist: TODO → IN_PROGRESS → DONE, with
//! DONE terminal. Self-transitions and skips are invalid. A DONE task is
//! frozen entirely: status, fields, and assignment all reject mutation.

use crate::db::{OrgRole, ProjectRole, TaskStatus};
use crate::error::DomainError;

/// The transition whitelist. Everything not listed here is invalid.
pub fn is_valid_transition(from: TaskStatus, to: TaskStatus) -> bool {
    matches!(
        (from, to),
        (TaskStatus::Todo, TaskStatus::InProgress) | (TaskStatus::InProgress, TaskStatus::Done)
    )
}

/// Reject any mutation of a completed task. Runs before every non-status
/// field update, assignment change, and delete.
pub fn ensure_task_mutable(current: TaskStatus) -> Result<(), DomainError> {
    if current == TaskStatus::Done {
        return Err(DomainError::TaskAlreadyDone);
    }
    Ok(())
}

/// Validate a status change end to end, in order: terminal check first
/// (DONE freezes the whole task, not just status), then the transition
/// table, then the members-touch-own-tasks rule. `project_role` is `None`
/// when the caller passed the gate as an org admin.
pub fn authorize_status_change(
    current: TaskStatus,
    requested: TaskStatus,
    assigned_to: Option<&str>,
    actor_id: &str,
    actor_org_role: OrgRole,
    project_role: Option<ProjectRole>,
) -> Result<(), DomainError> {
    ensure_task_mutable(current)?;

    if !is_valid_transition(current, requested) {
        return Err(DomainError::InvalidTransition {
            from: current,
            to: requested,
        });
    }

    if project_role == Some(ProjectRole::Member)
        && actor_org_role != OrgRole::Admin
        && assigned_to != Some(actor_id)
    {
        return Err(DomainError::forbidden(
            "You can only update your own assigned tasks",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskStatus::{Done, InProgress, Todo};

    #[test]
    fn transition_table_is_exactly_the_whitelist() {
        assert!(is_valid_transition(Todo, InProgress));
        assert!(is_valid_transition(InProgress, Done));

        assert!(!is_valid_transition(Todo, Done));
        assert!(!is_valid_transition(InProgress, Todo));
        assert!(!is_valid_transition(Done, Todo));
        assert!(!is_valid_transition(Done, InProgress));

        for status in [Todo, InProgress, Done] {
            assert!(!is_valid_transition(status, status));
        }
    }

    #[test]
    fn done_is_frozen_before_the_table_is_consulted() {
        // DONE → DONE reads as a frozen task, not an invalid transition
        let err = authorize_status_change(Done, Done, None, "u1", OrgRole::Member, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::TaskAlreadyDone));

        let err = authorize_status_change(Done, Todo, None, "u1", OrgRole::Admin, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::TaskAlreadyDone));
    }

    #[test]
    fn invalid_transitions_carry_both_states() {
        let err = authorize_status_change(Todo, Done, None, "u1", OrgRole::Admin, None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status transition from TODO to DONE"
        );
    }

    #[test]
    fn members_may_only_move_their_own_tasks() {
        // Assignee moves their own task
        assert!(authorize_status_change(
            Todo,
            InProgress,
            Some("u1"),
            "u1",
            OrgRole::Member,
            Some(ProjectRole::Member),
        )
        .is_ok());

        // Another member may not
        assert!(matches!(
            authorize_status_change(
                InProgress,
                Done,
                Some("u1"),
                "u2",
                OrgRole::Member,
                Some(ProjectRole::Member),
            ),
            Err(DomainError::Forbidden(_))
        ));

        // Unassigned tasks are off-limits to members too
        assert!(matches!(
            authorize_status_change(
                Todo,
                InProgress,
                None,
                "u2",
                OrgRole::Member,
                Some(ProjectRole::Member),
            ),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn managers_and_admins_move_any_task() {
        assert!(authorize_status_change(
            InProgress,
            Done,
            Some("u1"),
            "u2",
            OrgRole::Member,
            Some(ProjectRole::Manager),
        )
        .is_ok());

        // An org admin who also holds a MEMBER membership is not bound by
        // the assignee rule
        assert!(authorize_status_change(
            Todo,
            InProgress,
            Some("u1"),
            "u2",
            OrgRole::Admin,
            Some(ProjectRole::Member),
        )
        .is_ok());
    }

    #[test]
    fn completed_tasks_reject_field_mutation() {
        assert!(ensure_task_mutable(Todo).is_ok());
        assert!(ensure_task_mutable(InProgress).is_ok());
        assert!(matches!(
            ensure_task_mutable(Done),
            Err(DomainError::TaskAlreadyDone)
        ));
    }
}
