use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

use crate::{
    db::models::{Skill, User},
    error::{AppError, Result},
    middleware::auth::AdminUser,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", delete(delete_user))
        .route("/skills", get(list_skills))
}

async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<Vec<User>>> {
    Ok(Json(state.storage.list_users().await?))
}

async fn list_skills(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<Skill>>> {
    Ok(Json(state.storage.list_skills().await?))
}

async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    if state.storage.delete_user(id).await? {
        tracing::info!("Admin {} deleted user {}", admin.0.id, id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("User not found".to_string()))
    }
}
