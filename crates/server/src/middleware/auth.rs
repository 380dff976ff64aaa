use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::AppState;

/// The authenticated principal, resolved once per request from the bearer
/// session token. Handlers take this as an argument instead of reading
/// ambient session state.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    /// The session token the request carried, so logout can revoke it.
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        let user_id = state
            .sessions
            .resolve(token)
            .await
            .ok_or(AppError::Unauthorized)?;

        let user = state
            .storage
            .get_user(user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            token: token.to_string(),
        })
    }
}

/// Admin gate layered on top of [`AuthUser`].
#[derive(Clone, Debug)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AppError::Forbidden("Not authorized".to_string()));
        }
        Ok(AdminUser(user))
    }
}
