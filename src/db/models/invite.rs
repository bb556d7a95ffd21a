//! Email invite models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Single-use invite. `accepted_at` is null until the invite is consumed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invite {
    pub id: String,
    pub org_id: String,
    pub email: String,
    pub role: String,
    pub token: String,
    pub expires_at: String,
    pub accepted_at: Option<String>,
    pub created_by: String,
    pub created_at: String,
}

impl Invite {
    pub fn is_expired(&self) -> bool {
        if let Ok(expires) = chrono::DateTime::parse_from_rfc3339(&self.expires_at) {
            expires < chrono::Utc::now()
        } else {
            true // Treat parse errors as expired
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted_at.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateInviteRequest {
    pub email: String,
    /// Org role to assign on acceptance (ADMIN or MEMBER)
    pub role: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteResponse {
    pub message: String,
    pub invite_link: String,
}

#[derive(Debug, Deserialize)]
pub struct AcceptInviteRequest {
    pub token: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}
