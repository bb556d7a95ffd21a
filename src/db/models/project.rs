//! Project and project membership models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Project-level roles, independent of org roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProjectRole {
    /// Manages membership, tasks, and assignments within the project
    Manager,
    /// May work tasks assigned to them
    Member,
}

impl std::fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectRole::Manager => write!(f, "MANAGER"),
            ProjectRole::Member => write!(f, "MEMBER"),
        }
    }
}

impl std::str::FromStr for ProjectRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MANAGER" => Ok(ProjectRole::Manager),
            "MEMBER" => Ok(ProjectRole::Member),
            _ => Err(format!("Unknown project role: {}", s)),
        }
    }
}

impl From<String> for ProjectRole {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(ProjectRole::Member)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_archived: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// One membership row per (project, user)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectMember {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub role: String,
    pub created_at: String,
}

impl ProjectMember {
    pub fn role_enum(&self) -> ProjectRole {
        ProjectRole::from(self.role.clone())
    }
}

/// Project with member count for list views
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectWithMemberCount {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_archived: bool,
    pub created_by: String,
    pub created_by_name: String,
    pub created_at: String,
    pub member_count: i64,
}

/// Membership row joined with user details
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectMemberWithUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProjectMemberRequest {
    pub user_id: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectMemberRoleRequest {
    pub role: String,
}
