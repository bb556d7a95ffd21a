//! User lifecycle endpoints: invites, role changes, deactivation.
//!
//! Every mutation here is admin-gated; membership guards run on the same
//! transaction as the write they protect.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::access::require_org_role;
use crate::auth::{generate_token, hash_password};
use crate::db::{
    actions, entities, AcceptInviteRequest, CreateInviteRequest, CreateInviteResponse, Invite,
    MessageResponse, OrgRole, UpdateUserRoleRequest, User, UserResponse,
};
use crate::guards::ensure_not_last_admin;
use crate::AppState;

use super::audit::audit_log;
use super::auth::AuthUser;
use super::error::ApiError;
use super::validation::{validate_email, validate_password_strength, validate_uuid};

fn validate_org_role(role: &str) -> Result<OrgRole, ApiError> {
    role.parse::<OrgRole>()
        .map_err(|_| ApiError::validation_field("role", "Invalid role. Must be ADMIN or MEMBER"))
}

/// Create an invite for an email address. At most one outstanding invite
/// per (email, org); existing users cannot be re-invited.
pub async fn create_invite(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateInviteRequest>,
) -> Result<(StatusCode, Json<CreateInviteResponse>), ApiError> {
    require_org_role(&user.claims, &[OrgRole::Admin])?;

    validate_email(&req.email).map_err(|e| ApiError::validation_field("email", e))?;
    validate_org_role(&req.role)?;

    let existing_user: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&req.email)
        .fetch_optional(&state.db)
        .await?;
    if existing_user.is_some() {
        return Err(ApiError::conflict("User with this email already exists"));
    }

    let now = chrono::Utc::now();
    let outstanding: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM invites
         WHERE email = ? AND org_id = ? AND accepted_at IS NULL AND expires_at > ?",
    )
    .bind(&req.email)
    .bind(user.org_id())
    .bind(now.to_rfc3339())
    .fetch_optional(&state.db)
    .await?;
    if outstanding.is_some() {
        return Err(ApiError::conflict("Invite already sent"));
    }

    let token = generate_token();
    let expires_at =
        (now + chrono::Duration::hours(state.config.auth.invite_ttl_hours)).to_rfc3339();

    sqlx::query(
        "INSERT INTO invites (id, org_id, email, role, token, expires_at, created_by, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user.org_id())
    .bind(&req.email)
    .bind(req.role.to_uppercase())
    .bind(&token)
    .bind(&expires_at)
    .bind(user.user_id())
    .bind(now.to_rfc3339())
    .execute(&state.db)
    .await?;

    let invite_link = format!(
        "{}/accept-invite?token={}",
        state.config.server.frontend_url.trim_end_matches('/'),
        token
    );

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::USER_INVITE,
        entities::INVITE,
        None,
        Some(serde_json::json!({ "email": req.email, "role": req.role })),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(CreateInviteResponse {
            message: "Invite created successfully".to_string(),
            invite_link,
        }),
    ))
}

/// Accept an invite, creating the user account. Public endpoint; the
/// token is the credential. Consumption and user creation commit
/// together.
pub async fn accept_invite(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AcceptInviteRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    if req.token.is_empty() {
        return Err(ApiError::bad_request("Token and password are required"));
    }
    if let Some(e) = validate_password_strength(&req.password) {
        return Err(ApiError::validation_field("password", e));
    }

    let mut tx = state.db.begin().await?;

    let invite: Option<Invite> = sqlx::query_as("SELECT * FROM invites WHERE token = ?")
        .bind(&req.token)
        .fetch_optional(&mut *tx)
        .await?;
    let invite = invite.ok_or_else(|| ApiError::bad_request("Invalid invite token"))?;

    if invite.is_accepted() {
        return Err(ApiError::bad_request("Invite already used"));
    }
    if invite.is_expired() {
        return Err(ApiError::bad_request("Invite token expired"));
    }

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&invite.email)
        .fetch_optional(&mut *tx)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("User already exists"));
    }

    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    let user_id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let name = req
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| invite.email.split('@').next().unwrap_or("").to_string());

    sqlx::query(
        "INSERT INTO users (id, org_id, email, password_hash, name, role, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(&user_id)
    .bind(&invite.org_id)
    .bind(&invite.email)
    .bind(&password_hash)
    .bind(name.trim())
    .bind(&invite.role)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE invites SET accepted_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&invite.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    audit_log(
        &state,
        &invite.org_id,
        Some(&user_id),
        actions::USER_INVITE_ACCEPT,
        entities::USER,
        Some(&user_id),
        None,
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            "Invite accepted and user created successfully",
        )),
    ))
}

/// List the organization's users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_org_role(&user.claims, &[OrgRole::Admin])?;

    let users: Vec<User> =
        sqlx::query_as("SELECT * FROM users WHERE org_id = ? ORDER BY created_at ASC")
            .bind(user.org_id())
            .fetch_all(&state.db)
            .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Change a user's org role. Demotions run the last-admin guard inside
/// the update transaction.
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    user: AuthUser,
    Json(req): Json<UpdateUserRoleRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_org_role(&user.claims, &[OrgRole::Admin])?;

    if let Err(e) = validate_uuid(&user_id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }
    let new_role = validate_org_role(&req.role)?;

    if user_id == user.user_id() {
        return Err(ApiError::bad_request("You cannot change your own role"));
    }

    let mut tx = state.db.begin().await?;

    if new_role == OrgRole::Member {
        ensure_not_last_admin(&mut *tx, user.org_id(), &user_id)
            .await
            .map_err(ApiError::from)?;
    }

    let result = sqlx::query(
        "UPDATE users SET role = ?, updated_at = ? WHERE id = ? AND org_id = ?",
    )
    .bind(new_role.to_string())
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(&user_id)
    .bind(user.org_id())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found in this organization"));
    }

    tx.commit().await?;

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::USER_ROLE_UPDATE,
        entities::USER,
        Some(&user_id),
        Some(serde_json::json!({ "role": new_role.to_string() })),
    )
    .await;

    Ok(Json(MessageResponse::new("User role changed successfully")))
}

/// Soft-delete a user. Self-deactivation is rejected before the
/// last-admin guard runs; the guard protects per target, not per caller.
pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    require_org_role(&user.claims, &[OrgRole::Admin])?;

    if let Err(e) = validate_uuid(&user_id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    if user_id == user.user_id() {
        return Err(ApiError::bad_request("You cannot deactivate yourself"));
    }

    let mut tx = state.db.begin().await?;

    ensure_not_last_admin(&mut *tx, user.org_id(), &user_id)
        .await
        .map_err(ApiError::from)?;

    let result = sqlx::query(
        "UPDATE users SET is_active = 0, updated_at = ? WHERE id = ? AND org_id = ?",
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(&user_id)
    .bind(user.org_id())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found in this organization"));
    }

    tx.commit().await?;

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::USER_DEACTIVATE,
        entities::USER,
        Some(&user_id),
        None,
    )
    .await;

    Ok(Json(MessageResponse::new("User deactivated")))
}

/// Reverse a soft-delete
pub async fn reactivate_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    require_org_role(&user.claims, &[OrgRole::Admin])?;

    if let Err(e) = validate_uuid(&user_id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    if user_id == user.user_id() {
        return Err(ApiError::bad_request("You cannot reactivate yourself"));
    }

    let result = sqlx::query(
        "UPDATE users SET is_active = 1, updated_at = ? WHERE id = ? AND org_id = ?",
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(&user_id)
    .bind(user.org_id())
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found in this organization"));
    }

    audit_log(
        &state,
        user.org_id(),
        Some(user.user_id()),
        actions::USER_REACTIVATE,
        entities::USER,
        Some(&user_id),
        None,
    )
    .await;

    Ok(Json(MessageResponse::new("User reactivated")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_role_strings_parse_strictly() {
        assert!(validate_org_role("ADMIN").is_ok());
        assert!(validate_org_role("member").is_ok());
        assert!(validate_org_role("OWNER").is_err());
        assert!(validate_org_role("").is_err());
    }
}
