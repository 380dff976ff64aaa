use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    db::models::{NewUser, User, UserPatch},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user", get(current_user).put(update_profile))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub name: String,
    pub password: String,
    pub confirm_password: String,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AppError::Internal("Failed to hash password".to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    if body.username.trim().is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if body.email.is_empty() || !body.email.contains('@') {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if body.password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    if body.password != body.confirm_password {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }

    if state
        .storage
        .get_user_by_username(&body.username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }
    if state
        .storage
        .get_user_by_email(&body.email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hash_password(&body.password)?;
    let user = state
        .storage
        .create_user(NewUser {
            username: body.username,
            password_hash,
            email: body.email,
            name: body.name,
            bio: body.bio,
            profile_image: body.profile_image,
        })
        .await?;

    tracing::info!("Registered user {} ({})", user.username, user.id);
    let token = state.sessions.create(user.id).await;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let user = state
        .storage
        .get_user_by_username(&body.username)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let token = state.sessions.create(user.id).await;

    Ok(Json(AuthResponse { token, user }))
}

async fn logout(State(state): State<AppState>, user: AuthUser) -> Json<serde_json::Value> {
    state.sessions.revoke(&user.token).await;
    Json(json!({ "success": true }))
}

async fn current_user(State(state): State<AppState>, user: AuthUser) -> Result<Json<User>> {
    let user = state
        .storage
        .get_user(user.id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(user))
}

async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    if let Some(name) = &body.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Name cannot be empty".to_string()));
        }
    }

    let updated = state
        .storage
        .update_user(
            user.id,
            UserPatch {
                name: body.name,
                bio: body.bio,
                profile_image: body.profile_image,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(updated))
}
