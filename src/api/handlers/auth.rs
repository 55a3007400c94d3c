use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::json;

use crate::api::types::{AppError, AppState};
use crate::auth::{self, Role};

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let username = body.username.trim();
    if username.len() < 3 || username.len() > 20 {
        return Err(AppError::Validation(
            "username must be 3-20 characters".to_string(),
        ));
    }
    if body.password.len() < 6 {
        return Err(AppError::Validation(
            "password must be at least 6 characters".to_string(),
        ));
    }

    let hash = auth::hash_password(body.password).await?;
    state
        .storage
        .create_user(username, &hash, Role::User.as_str())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "registration successful"
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<serde_json::Value>, AppError> {
    let invalid = || AppError::Unauthorized("invalid username or password".to_string());

    let user = state
        .storage
        .get_user_by_username(body.username.trim())
        .await?
        .ok_or_else(invalid)?;

    if !auth::verify_password(body.password, user.password_hash.clone()).await? {
        return Err(invalid());
    }

    let token = auth::issue_token(&state.config, &user).map_err(AppError::internal)?;
    Ok(Json(json!({
        "status": "success",
        "token": token
    })))
}
