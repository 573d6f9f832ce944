//! Chat Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::application::dto::request::{AddMemberRequest, CreateDirectChatRequest, CreateGroupChatRequest};
use crate::application::dto::response::{ChatResponse, SuccessResponse};
use crate::application::services::{ChatError, ChatService, ChatServiceImpl};
use crate::domain::ChatId;
use crate::presentation::http::extractors::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

fn chat_service(state: &AppState) -> ChatServiceImpl {
    ChatServiceImpl::new(state.users.clone(), state.chats.clone(), state.hub.clone())
}

fn map_chat_error(e: ChatError) -> AppError {
    match e {
        ChatError::UserNotFound(name) => AppError::NotFound(format!("User not found: {name}")),
        ChatError::ChatNotFound => AppError::NotFound("Chat not found".into()),
        ChatError::Forbidden => AppError::Forbidden("Not a member of this chat".into()),
        ChatError::NotAGroup => AppError::BadRequest(e.to_string()),
        ChatError::AlreadyMember => AppError::Conflict(e.to_string()),
        ChatError::SelfChat => AppError::BadRequest(e.to_string()),
        ChatError::InvalidRequest(msg) => AppError::BadRequest(msg),
        ChatError::Internal(msg) => AppError::Internal(msg),
    }
}

/// Open (or re-open) the direct chat with another user
pub async fn create_direct_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateDirectChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    body.validate().map_err(validation_error)?;

    let chat = chat_service(&state)
        .create_direct_chat(auth.user_id, &body.username)
        .await
        .map_err(map_chat_error)?;

    Ok((StatusCode::CREATED, Json(ChatResponse::from(chat))))
}

/// Create a group chat
pub async fn create_group_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateGroupChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    body.validate().map_err(validation_error)?;

    let chat = chat_service(&state)
        .create_group_chat(auth.user_id, &body.name, &body.usernames)
        .await
        .map_err(map_chat_error)?;

    Ok((StatusCode::CREATED, Json(ChatResponse::from(chat))))
}

/// Add a member to a group chat
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<String>,
    Json(body): Json<AddMemberRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    chat_service(&state)
        .add_member(auth.user_id, &ChatId::new(chat_id), body.user_id)
        .await
        .map_err(map_chat_error)?;

    Ok(Json(SuccessResponse::ok()))
}

/// List the caller's chats
pub async fn list_chats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ChatResponse>>, AppError> {
    let chats = chat_service(&state)
        .list_chats(auth.user_id)
        .await
        .map_err(map_chat_error)?;

    Ok(Json(chats.into_iter().map(ChatResponse::from).collect()))
}
