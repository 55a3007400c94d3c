//! Bearer-token access guard.
//!
//! Tokens are HS256 JWTs carrying the subject id, username, and role.
//! Protected handlers take [`Identity`] as an extractor argument; admin
//! handlers take [`Admin`]. Verification failures never reach the handler
//! body, so no state mutation can happen on a rejected request.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::types::{AppError, AppState};
use crate::config::Config;
use crate::storage::models::User;
use crate::storage::{Storage, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Role column values come from the users table; anything unknown is
    /// treated as an unprivileged user.
    pub fn from_db(value: &str) -> Self {
        match value {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub role: Role,
    pub exp: i64,
}

/// Verified caller identity attached by the guard.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub role: Role,
}

pub fn issue_token(config: &Config, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user.id.clone(),
        username: user.username.clone(),
        role: Role::from_db(&user.role),
        exp: chrono::Utc::now().timestamp() + config.token_ttl_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

#[async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("authentication token missing".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("authentication token missing".to_string()))?;

        let claims = verify_token(&state.config.jwt_secret, token).map_err(|_| {
            AppError::Unauthorized("authentication token invalid or expired".to_string())
        })?;

        Ok(Identity {
            id: claims.sub,
            username: claims.username,
            role: claims.role,
        })
    }
}

/// Identity plus an admin-role check, for administrative mutations.
pub struct Admin(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for Admin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let identity = Identity::from_request_parts(parts, state).await?;
        if identity.role != Role::Admin {
            return Err(AppError::Forbidden("admin access required".to_string()));
        }
        Ok(Admin(identity))
    }
}

/// bcrypt runs on the blocking pool; a verify takes long enough to matter
/// on the async workers.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)
}

/// Create the configured admin account if it does not exist yet.
pub async fn ensure_admin(storage: &Storage, username: &str, password: &str) -> anyhow::Result<()> {
    if storage.get_user_by_username(username).await?.is_some() {
        return Ok(());
    }

    let password = password.to_string();
    let hash =
        tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST)).await??;

    match storage.create_user(username, &hash, Role::Admin.as_str()).await {
        Ok(_) => {
            tracing::info!("Bootstrapped admin account {username}");
            Ok(())
        }
        // Another instance won the insert; the account exists either way.
        Err(StoreError::Conflict(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> User {
        User {
            id: "user-1".to_string(),
            username: "tester".to_string(),
            password_hash: "irrelevant".to_string(),
            role: role.to_string(),
            created_at: 0,
        }
    }

    #[test]
    fn token_round_trip_preserves_claims() {
        let config = Config::for_tests();
        let token = issue_token(&config, &user("admin")).unwrap();

        let claims = verify_token(&config.jwt_secret, &token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username, "tester");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = Config::for_tests();
        let claims = Claims {
            sub: "user-1".to_string(),
            username: "tester".to_string(),
            role: Role::User,
            exp: chrono::Utc::now().timestamp() - 24 * 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert!(verify_token(&config.jwt_secret, &token).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let config = Config::for_tests();
        let token = issue_token(&config, &user("user")).unwrap();

        assert!(verify_token("a-different-secret", &token).is_err());
    }

    #[test]
    fn unknown_role_maps_to_user() {
        assert_eq!(Role::from_db("superuser"), Role::User);
        assert_eq!(Role::from_db("admin"), Role::Admin);
    }
}
