use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    db::models::{NewReview, Review, UserSummary},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    services::review,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_review))
        .route("/user/:user_id", get(reviews_for_user))
        .route("/user/:user_id/average", get(average_rating))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub exchange_id: i64,
    pub reviewer_id: Option<i64>,
    pub receiver_id: Option<i64>,
    pub rating: i32,
    pub comment: Option<String>,
}

/// A review with the reviewer's public summary embedded.
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    #[serde(flatten)]
    pub review: Review,
    pub reviewer: Option<UserSummary>,
}

async fn reviews_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<ReviewResponse>>> {
    let reviews = state.storage.get_reviews_by_user(user_id).await?;

    let mut out = Vec::with_capacity(reviews.len());
    for review in reviews {
        let reviewer = state.storage.get_user(review.reviewer_id).await?;
        out.push(ReviewResponse {
            reviewer: reviewer.as_ref().map(UserSummary::from),
            review,
        });
    }
    Ok(Json(out))
}

async fn average_rating(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let average = state.storage.get_average_rating_for_user(user_id).await?;
    Ok(Json(json!({ "averageRating": average })))
}

async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    if let Some(reviewer_id) = body.reviewer_id {
        if reviewer_id != user.id {
            return Err(AppError::Validation(
                "Reviewer ID must match the authenticated user".to_string(),
            ));
        }
    }

    let exchange = state
        .storage
        .get_exchange(body.exchange_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exchange not found".to_string()))?;

    let receiver_id = review::validate_review(&exchange, user.id, body.receiver_id, body.rating)?;

    let created = state
        .storage
        .create_review(NewReview {
            exchange_id: body.exchange_id,
            reviewer_id: user.id,
            receiver_id,
            rating: body.rating,
            comment: body.comment,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}
