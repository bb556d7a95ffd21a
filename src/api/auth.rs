//! Authentication endpoints: signup, login, token refresh, logout, and
//! the current-user profile.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{
    self, hash_password, issue_pair, revoke, rotate, sweep_expired, verify_password, AccessClaims,
};
use crate::db::{
    actions, entities, LoginRequest, LoginResponse, MessageResponse, OrgRole, ProfileResponse,
    RefreshRequest, SignupRequest, TokenPairResponse, User, UserResponse,
};
use crate::AppState;

use crate::error::DomainError;

use super::audit::audit_log;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{generate_slug, validate_email, validate_password_strength};

/// Authenticated identity recovered from a bearer access token. Claims
/// verify without a database round-trip; role claims are stale for at
/// most the access token TTL after a role change.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: AccessClaims,
}

impl AuthUser {
    pub fn user_id(&self) -> &str {
        &self.claims.sub
    }

    pub fn org_id(&self) -> &str {
        &self.claims.org
    }

    pub fn org_role(&self) -> OrgRole {
        self.claims.role_enum()
    }
}

/// Extract the bearer token from request headers
fn extract_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Missing access token"))?;

        let claims = auth::verify_access(&state.config.auth, token)?;
        Ok(AuthUser { claims })
    }
}

/// Create an organization together with its first (admin) user.
/// Both rows are written in one transaction; partial creation is never
/// observable.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if req.org_name.trim().is_empty() {
        errors.add("orgName", "Organization name is required");
    }
    if let Err(e) = validate_email(&req.admin_email) {
        errors.add("adminEmail", e);
    }
    if let Some(e) = validate_password_strength(&req.password) {
        errors.add("password", e);
    }
    errors.finish()?;

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&req.admin_email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("A user with this email already exists"));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let org_id = Uuid::new_v4().to_string();
    let user_id = Uuid::new_v4().to_string();

    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    // Default display name from the mailbox part of the email
    let default_name = req
        .admin_email
        .split('@')
        .next()
        .unwrap_or("")
        .to_string();

    let mut tx = state.db.begin().await?;

    let mut slug = generate_slug(&req.org_name);
    let taken: Option<(String,)> = sqlx::query_as("SELECT id FROM organizations WHERE slug = ?")
        .bind(&slug)
        .fetch_optional(&mut *tx)
        .await?;
    if taken.is_some() {
        slug = format!("{}-{}", slug, &org_id[..8]);
    }

    sqlx::query(
        "INSERT INTO organizations (id, name, slug, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&org_id)
    .bind(req.org_name.trim())
    .bind(&slug)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO users (id, org_id, email, password_hash, name, role, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 'ADMIN', 1, ?, ?)",
    )
    .bind(&user_id)
    .bind(&org_id)
    .bind(&req.admin_email)
    .bind(&password_hash)
    .bind(&default_name)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(org = %slug, "Created organization with admin {}", req.admin_email);

    audit_log(
        &state,
        &org_id,
        Some(&user_id),
        actions::AUTH_SIGNUP,
        entities::ORGANIZATION,
        Some(&org_id),
        None,
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Organization and admin created successfully".to_string(),
        }),
    ))
}

/// Login with email and password, returning a fresh token pair.
/// Expired refresh tokens belonging to the user are swept as a side
/// effect.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&req.email)
        .fetch_optional(&state.db)
        .await?;

    // Same failure for unknown email and wrong password
    let user = user.ok_or(DomainError::InvalidCredentials).map_err(ApiError::from)?;

    if !user.is_active {
        return Err(DomainError::AccountDeactivated.into());
    }

    if !verify_password(&req.password, &user.password_hash) {
        return Err(DomainError::InvalidCredentials.into());
    }

    sweep_expired(&state.db, &user.id).await?;

    let (access_token, refresh_token) = issue_pair(&state.db, &state.config.auth, &user).await?;

    audit_log(
        &state,
        &user.org_id,
        Some(&user.id),
        actions::AUTH_LOGIN,
        entities::USER,
        Some(&user.id),
        None,
    )
    .await;

    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
        user: UserResponse::from(user),
    }))
}

/// Rotate a refresh token for a new pair. The presented token is
/// single-use: a second rotation attempt with it fails.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    if req.refresh_token.is_empty() {
        return Err(ApiError::unauthorized("Refresh token is required"));
    }

    let (access_token, refresh_token) =
        rotate(&state.db, &state.config.auth, &req.refresh_token).await?;

    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token,
    }))
}

/// Delete a refresh token. Idempotent; revoking an unknown token just
/// means the logout already happened.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if req.refresh_token.is_empty() {
        return Err(ApiError::bad_request("Refresh token is required"));
    }

    revoke(&state.db, &req.refresh_token).await?;

    Ok(Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// Current user's profile merged with the organization name
pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile: Option<ProfileResponse> = sqlx::query_as(
        r#"
        SELECT u.id, u.email, u.name, u.role, u.org_id, o.name AS org_name
        FROM users u
        JOIN organizations o ON u.org_id = o.id
        WHERE u.id = ?
        "#,
    )
    .bind(user.user_id())
    .fetch_optional(&state.db)
    .await?;

    profile
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User profile not found"))
}
