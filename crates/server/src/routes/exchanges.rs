use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{Exchange, ExchangeStatus, NewExchange, Skill, UserSummary},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    services::exchange as lifecycle,
    storage::DynStorage,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_exchanges).post(create_exchange))
        .route("/active", get(active_exchanges))
        .route("/:id", get(get_exchange))
        .route("/:id/status", put(update_status))
        .route("/:id/next-session", put(update_next_session))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExchangeRequest {
    pub provider_id: i64,
    pub requester_skill_id: Option<i64>,
    pub provider_skill_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNextSessionRequest {
    pub next_session: DateTime<Utc>,
}

/// An exchange decorated with both participants and both skills.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
    #[serde(flatten)]
    pub exchange: Exchange,
    pub requester: Option<UserSummary>,
    pub provider: Option<UserSummary>,
    pub requester_skill: Option<Skill>,
    pub provider_skill: Option<Skill>,
}

async fn decorate(storage: &DynStorage, exchange: Exchange) -> Result<ExchangeResponse> {
    let requester = storage.get_user(exchange.requester_id).await?;
    let provider = storage.get_user(exchange.provider_id).await?;
    let requester_skill = match exchange.requester_skill_id {
        Some(id) => storage.get_skill(id).await?,
        None => None,
    };
    let provider_skill = match exchange.provider_skill_id {
        Some(id) => storage.get_skill(id).await?,
        None => None,
    };

    Ok(ExchangeResponse {
        requester: requester.as_ref().map(UserSummary::from),
        provider: provider.as_ref().map(UserSummary::from),
        requester_skill,
        provider_skill,
        exchange,
    })
}

async fn decorate_all(
    storage: &DynStorage,
    exchanges: Vec<Exchange>,
) -> Result<Vec<ExchangeResponse>> {
    let mut out = Vec::with_capacity(exchanges.len());
    for exchange in exchanges {
        out.push(decorate(storage, exchange).await?);
    }
    Ok(out)
}

async fn list_exchanges(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ExchangeResponse>>> {
    let exchanges = state.storage.get_exchanges_by_user(user.id).await?;
    Ok(Json(decorate_all(&state.storage, exchanges).await?))
}

async fn active_exchanges(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ExchangeResponse>>> {
    let exchanges = state.storage.get_active_exchanges_by_user(user.id).await?;
    Ok(Json(decorate_all(&state.storage, exchanges).await?))
}

async fn get_exchange(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ExchangeResponse>> {
    let exchange = state
        .storage
        .get_exchange(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exchange not found".to_string()))?;

    if !exchange.is_participant(user.id) && !user.is_admin {
        return Err(AppError::Forbidden(
            "Not authorized to view this exchange".to_string(),
        ));
    }

    Ok(Json(decorate(&state.storage, exchange).await?))
}

async fn create_exchange(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateExchangeRequest>,
) -> Result<(StatusCode, Json<Exchange>)> {
    if body.provider_id == user.id {
        return Err(AppError::Validation(
            "Cannot request an exchange with yourself".to_string(),
        ));
    }
    if state.storage.get_user(body.provider_id).await?.is_none() {
        return Err(AppError::NotFound("Provider not found".to_string()));
    }

    let exchange = state
        .storage
        .create_exchange(NewExchange {
            requester_id: user.id,
            provider_id: body.provider_id,
            requester_skill_id: body.requester_skill_id,
            provider_skill_id: body.provider_skill_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(exchange)))
}

async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Exchange>> {
    let status: ExchangeStatus = body
        .status
        .parse()
        .map_err(|_| AppError::Validation("Invalid status".to_string()))?;

    let exchange = state
        .storage
        .get_exchange(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exchange not found".to_string()))?;

    lifecycle::validate_transition(&exchange, status, user.id, user.is_admin)?;

    let updated = state
        .storage
        .update_exchange_status(id, status)
        .await?
        .ok_or_else(|| AppError::NotFound("Exchange not found".to_string()))?;

    tracing::info!(
        "Exchange {} moved {} -> {} by user {}",
        id,
        exchange.status,
        status,
        user.id
    );

    Ok(Json(updated))
}

async fn update_next_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateNextSessionRequest>,
) -> Result<Json<Exchange>> {
    let exchange = state
        .storage
        .get_exchange(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exchange not found".to_string()))?;

    if !exchange.is_participant(user.id) && !user.is_admin {
        return Err(AppError::Forbidden(
            "Not authorized to update this exchange".to_string(),
        ));
    }
    if !lifecycle::can_schedule_session(exchange.status) {
        return Err(AppError::Validation(
            "Next session can only be set while the exchange is accepted or in progress"
                .to_string(),
        ));
    }

    let updated = state
        .storage
        .update_exchange_next_session(id, body.next_session)
        .await?
        .ok_or_else(|| AppError::NotFound("Exchange not found".to_string()))?;

    Ok(Json(updated))
}
