//! Message Handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::application::dto::request::SendMessageRequest;
use crate::application::dto::response::{MessageResponse, SuccessResponse};
use crate::application::services::{MessageError, MessageQuery, MessageService, MessageServiceImpl};
use crate::domain::{ChatId, MessageDraft};
use crate::presentation::http::extractors::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

/// History query parameters
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub before: Option<i64>,
    pub limit: Option<i64>,
}

fn message_service(state: &AppState) -> MessageServiceImpl {
    MessageServiceImpl::new(state.messages.clone(), state.membership.clone())
}

fn map_message_error(e: MessageError) -> AppError {
    match e {
        MessageError::NotFound => AppError::NotFound("Message not found".into()),
        MessageError::Forbidden => AppError::Forbidden("Permission denied".into()),
        MessageError::Internal(msg) => AppError::Internal(msg),
    }
}

/// Get messages from a chat, newest first
pub async fn get_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let query = MessageQuery {
        before: params.before,
        limit: params.limit,
    };

    let messages = message_service(&state)
        .get_messages(auth.user_id, &ChatId::new(chat_id), query)
        .await
        .map_err(map_message_error)?;

    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

/// Send a message through the hub, exactly as a WebSocket client would
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    body.validate().map_err(validation_error)?;

    let draft = MessageDraft::new(ChatId::new(chat_id), auth.user_id, body.content);
    let message = state.hub.submit(draft).await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

/// Soft-delete one of the caller's messages
pub async fn delete_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    message_service(&state)
        .delete_message(auth.user_id, message_id)
        .await
        .map_err(map_message_error)?;

    Ok(Json(SuccessResponse::ok()))
}
