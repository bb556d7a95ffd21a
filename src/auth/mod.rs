//! Token service: password hashing, access token issuance/verification,
//! and refresh token rotation.
//!
//! Access tokens are short-lived HS256 JWTs carrying (userId, orgId, role)
//! and verify without a database round-trip. Refresh tokens are opaque
//! random values persisted server-side as SHA-256 hashes, valid for at
//! most one successful rotation.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqliteConnection;

use crate::config::AuthConfig;
use crate::db::{DbPool, OrgRole, RefreshTokenRow, User};
use crate::error::DomainError;

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub sub: String,
    /// Organization id
    pub org: String,
    /// Org role at issue time. Stale for at most the access token TTL
    /// after a role change or deactivation.
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    pub fn role_enum(&self) -> OrgRole {
        OrgRole::from(self.role.clone())
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate an opaque random token (invites and refresh tokens)
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Mint a signed access token for the given identity
pub fn issue_access_token(
    config: &AuthConfig,
    user_id: &str,
    org_id: &str,
    role: &str,
) -> Result<String, DomainError> {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: user_id.to_string(),
        org: org_id.to_string(),
        role: role.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::minutes(config.access_token_ttl_minutes)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.access_token_secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Failed to sign access token: {}", e);
        DomainError::TokenSigning
    })
}

/// Verify an access token and recover its claims. Fails on bad signature
/// or expiry; the caller must reject the request with 401.
pub fn verify_access(config: &AuthConfig, token: &str) -> Result<AccessClaims, DomainError> {
    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.access_token_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| DomainError::InvalidAccessToken)
}

async fn store_refresh_token(
    conn: &mut SqliteConnection,
    user_id: &str,
    token: &str,
    ttl_days: i64,
) -> Result<(), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    let expires_at = (now + Duration::days(ttl_days)).to_rfc3339();

    sqlx::query(
        "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(hash_token(token))
    .bind(&expires_at)
    .bind(now.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

/// Issue a fresh (access, refresh) pair for a user, persisting the refresh
/// token. Used at login and invite acceptance.
pub async fn issue_pair(
    db: &DbPool,
    config: &AuthConfig,
    user: &User,
) -> Result<(String, String), DomainError> {
    let access = issue_access_token(config, &user.id, &user.org_id, &user.role)?;
    let refresh = generate_token();

    let mut conn = db.acquire().await?;
    store_refresh_token(&mut conn, &user.id, &refresh, config.refresh_token_ttl_days).await?;

    Ok((access, refresh))
}

/// Rotate a refresh token: validate the presented token, re-check the
/// owning user is still active, then atomically replace the token with a
/// new pair. A presented token can succeed here at most once.
pub async fn rotate(
    db: &DbPool,
    config: &AuthConfig,
    presented: &str,
) -> Result<(String, String), DomainError> {
    let token_hash = hash_token(presented);
    let now = Utc::now().to_rfc3339();

    let mut tx = db.begin().await?;

    let row: Option<RefreshTokenRow> =
        sqlx::query_as("SELECT * FROM refresh_tokens WHERE token_hash = ? AND expires_at > ?")
            .bind(&token_hash)
            .bind(&now)
            .fetch_optional(&mut *tx)
            .await?;
    let row = row.ok_or(DomainError::InvalidRefreshToken)?;

    // Access-token claims can outlive a deactivation until they expire;
    // the refresh path re-checks liveness every time.
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ? AND is_active = 1")
        .bind(&row.user_id)
        .fetch_optional(&mut *tx)
        .await?;
    let user = user.ok_or(DomainError::UserInactiveOrDeleted)?;

    let access = issue_access_token(config, &user.id, &user.org_id, &user.role)?;
    let refresh = generate_token();

    // Insert-new before delete-old: a crash between the steps leaves the
    // user holding a spare token rather than none.
    store_refresh_token(&mut tx, &user.id, &refresh, config.refresh_token_ttl_days).await?;

    let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE id = ?")
        .bind(&row.id)
        .execute(&mut *tx)
        .await?;
    if deleted.rows_affected() == 0 {
        // Another rotation consumed the presented token first
        return Err(DomainError::InvalidRefreshToken);
    }

    tx.commit().await?;

    Ok((access, refresh))
}

/// Delete a refresh token. Idempotent: revoking an unknown token simply
/// means logout already completed.
pub async fn revoke(db: &DbPool, presented: &str) -> Result<(), DomainError> {
    sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = ?")
        .bind(hash_token(presented))
        .execute(db)
        .await?;
    Ok(())
}

/// Opportunistically purge a user's expired refresh tokens (run at login)
pub async fn sweep_expired(db: &DbPool, user_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ? AND expires_at < ?")
        .bind(user_id)
        .bind(Utc::now().to_rfc3339())
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_util::{seed_org, seed_user};

    fn test_config() -> AuthConfig {
        AuthConfig {
            access_token_secret: "test-secret".to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
            invite_ttl_hours: 48,
        }
    }

    #[test]
    fn access_token_round_trip() {
        let config = test_config();
        let token = issue_access_token(&config, "u1", "o1", "ADMIN").unwrap();
        let claims = verify_access(&config, &token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.org, "o1");
        assert_eq!(claims.role, "ADMIN");
        assert_eq!(claims.role_enum(), OrgRole::Admin);
    }

    #[test]
    fn expired_access_token_rejected() {
        let config = test_config();
        let now = Utc::now();
        let claims = AccessClaims {
            sub: "u1".to_string(),
            org: "o1".to_string(),
            role: "MEMBER".to_string(),
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.access_token_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            verify_access(&config, &token),
            Err(DomainError::InvalidAccessToken)
        ));
    }

    #[test]
    fn wrong_secret_rejected() {
        let config = test_config();
        let token = issue_access_token(&config, "u1", "o1", "MEMBER").unwrap();

        let other = AuthConfig {
            access_token_secret: "other-secret".to_string(),
            ..test_config()
        };
        assert!(matches!(
            verify_access(&other, &token),
            Err(DomainError::InvalidAccessToken)
        ));
    }

    #[tokio::test]
    async fn rotation_is_single_use() {
        let db = crate::db::init_in_memory().await.unwrap();
        let config = test_config();
        let org = seed_org(&db, "acme").await;
        let user = seed_user(&db, &org, "a@acme.test", "ADMIN", true).await;

        let (_, refresh) = issue_pair(&db, &config, &user).await.unwrap();

        let (access2, refresh2) = rotate(&db, &config, &refresh).await.unwrap();
        let claims = verify_access(&config, &access2).unwrap();
        assert_eq!(claims.sub, user.id);

        // Second use of the original token must fail
        assert!(matches!(
            rotate(&db, &config, &refresh).await,
            Err(DomainError::InvalidRefreshToken)
        ));

        // Exactly one live refresh token remains
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens WHERE user_id = ?")
                .bind(&user.id)
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(count, 1);

        // And the survivor is the replacement, not the original
        assert!(rotate(&db, &config, &refresh2).await.is_ok());
    }

    #[tokio::test]
    async fn rotation_rechecks_user_liveness() {
        let db = crate::db::init_in_memory().await.unwrap();
        let config = test_config();
        let org = seed_org(&db, "acme").await;
        let user = seed_user(&db, &org, "a@acme.test", "MEMBER", true).await;

        let (_, refresh) = issue_pair(&db, &config, &user).await.unwrap();

        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(&user.id)
            .execute(&db)
            .await
            .unwrap();

        assert!(matches!(
            rotate(&db, &config, &refresh).await,
            Err(DomainError::UserInactiveOrDeleted)
        ));
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let db = crate::db::init_in_memory().await.unwrap();
        let config = test_config();
        let org = seed_org(&db, "acme").await;
        let user = seed_user(&db, &org, "a@acme.test", "MEMBER", true).await;

        let (_, refresh) = issue_pair(&db, &config, &user).await.unwrap();

        revoke(&db, &refresh).await.unwrap();
        revoke(&db, &refresh).await.unwrap();
        revoke(&db, "never-issued").await.unwrap();

        assert!(matches!(
            rotate(&db, &config, &refresh).await,
            Err(DomainError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_tokens() {
        let db = crate::db::init_in_memory().await.unwrap();
        let config = test_config();
        let org = seed_org(&db, "acme").await;
        let user = seed_user(&db, &org, "a@acme.test", "MEMBER", true).await;

        let (_, live) = issue_pair(&db, &config, &user).await.unwrap();

        // Backdate a second token past its expiry
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind("stale")
        .bind(&user.id)
        .bind(hash_token("stale-token"))
        .bind((Utc::now() - Duration::days(1)).to_rfc3339())
        .bind((Utc::now() - Duration::days(8)).to_rfc3339())
        .execute(&db)
        .await
        .unwrap();

        sweep_expired(&db, &user.id).await.unwrap();

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens WHERE user_id = ?")
                .bind(&user.id)
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(count, 1);
        assert!(rotate(&db, &config, &live).await.is_ok());
    }
}
