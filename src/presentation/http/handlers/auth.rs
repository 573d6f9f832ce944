//! Authentication Handlers

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::application::dto::request::{LoginRequest, RegisterRequest};
use crate::application::dto::response::{RegisterResponse, TokenResponse, UserResponse};
use crate::application::services::{AccountService, AccountServiceImpl};
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

fn account_service(state: &AppState) -> AccountServiceImpl {
    AccountServiceImpl::new(state.users.clone(), state.settings.jwt.clone())
}

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    body.validate().map_err(validation_error)?;

    let (user, token) = account_service(&state).register(body.into()).await?;

    let response = RegisterResponse {
        user: UserResponse::from(user),
        access_token: token.access_token,
        token_type: token.token_type,
        expires_in: token.expires_in,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Login with credentials
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    body.validate().map_err(validation_error)?;

    let token = account_service(&state)
        .login(&body.username, &body.password)
        .await?;

    Ok(Json(TokenResponse::from(token)))
}
