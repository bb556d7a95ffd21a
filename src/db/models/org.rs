//! Organization model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Tenant root. Owns users, projects, and the audit trail. Created at
/// signup, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub created_at: String,
    pub updated_at: String,
}
