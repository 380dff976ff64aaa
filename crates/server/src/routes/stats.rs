use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{
    db::models::ExchangeStatus, error::Result, middleware::auth::AuthUser, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(dashboard_stats))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub active_exchanges: usize,
    pub completed_exchanges: usize,
    pub average_rating: f64,
    pub unread_messages: i64,
}

async fn dashboard_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<StatsResponse>> {
    let active_exchanges = state
        .storage
        .get_active_exchanges_by_user(user.id)
        .await?
        .len();
    let completed_exchanges = state
        .storage
        .get_exchanges_by_user(user.id)
        .await?
        .iter()
        .filter(|e| e.status == ExchangeStatus::Completed)
        .count();
    let average_rating = state.storage.get_average_rating_for_user(user.id).await?;
    let unread_messages = state.storage.get_unread_messages_count(user.id).await?;

    Ok(Json(StatsResponse {
        active_exchanges,
        completed_exchanges,
        average_rating,
        unread_messages,
    }))
}
