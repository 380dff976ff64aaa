use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    db::models::{Message, NewMessage, UserSummary},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    services::messaging,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_conversations).post(send_message))
        .route("/unread", get(unread_count))
        .route("/:id", get(get_conversation))
        .route("/:id/read", post(mark_read))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
}

/// A conversation preview: the partner plus messages newest-first.
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub user: Option<UserSummary>,
    pub messages: Vec<Message>,
}

async fn list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ConversationResponse>>> {
    let messages = state.storage.get_messages_by_user(user.id).await?;
    let conversations = messaging::group_conversations(user.id, messages);

    let mut out = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let partner = state.storage.get_user(conversation.partner_id).await?;
        out.push(ConversationResponse {
            user: partner.as_ref().map(UserSummary::from),
            messages: conversation.messages,
        });
    }
    Ok(Json(out))
}

async fn unread_count(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>> {
    let count = state.storage.get_unread_messages_count(user.id).await?;
    Ok(Json(json!({ "count": count })))
}

async fn get_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(partner_id): Path<i64>,
) -> Result<Json<ConversationResponse>> {
    // Oldest-first here: this feeds the open-conversation view
    let messages = state.storage.get_conversation(user.id, partner_id).await?;
    let partner = state.storage.get_user(partner_id).await?;

    Ok(Json(ConversationResponse {
        user: partner.as_ref().map(UserSummary::from),
        messages,
    }))
}

async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    if body.sender_id != user.id {
        return Err(AppError::Validation(
            "Sender ID must match the authenticated user".to_string(),
        ));
    }
    if body.content.trim().is_empty() {
        return Err(AppError::Validation("Message content is required".to_string()));
    }
    if state.storage.get_user(body.receiver_id).await?.is_none() {
        return Err(AppError::NotFound("Receiver not found".to_string()));
    }

    let message = state
        .storage
        .create_message(NewMessage {
            sender_id: body.sender_id,
            receiver_id: body.receiver_id,
            content: body.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let message = state
        .storage
        .get_message(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

    if message.receiver_id != user.id {
        return Err(AppError::Forbidden(
            "Not authorized to mark this message as read".to_string(),
        ));
    }

    state.storage.mark_message_as_read(id).await?;
    Ok(Json(json!({ "success": true })))
}
