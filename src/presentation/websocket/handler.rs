//! WebSocket Upgrade Handler
//!
//! Authenticates the request, upgrades it, registers the session with the
//! hub and runs it until either side goes away.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use super::connection::run_session;
use super::hub::Hub;
use super::messages::ServerFrame;
use crate::application::services::AuthError;
use crate::domain::UserId;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Query parameters accepted on `/ws`.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Credential for clients that cannot set headers
    pub token: Option<String>,
}

/// WebSocket upgrade handler.
///
/// The credential comes from `Authorization: Bearer` or `?token=`. Identity
/// is checked before the upgrade, so a refused client gets a plain 401.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let credential = bearer
        .map(|TypedHeader(Authorization(bearer))| bearer.token().to_owned())
        .or(params.token);

    let user_id = match authenticate(&state, credential).await {
        Ok(user_id) => user_id,
        Err(e) => {
            tracing::debug!(error = %e, "WebSocket upgrade refused");
            return AppError::from(e).into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let hub = state.hub.clone();
    let limits = state.settings.websocket.clone();

    ws.max_message_size(limits.max_message_size)
        .max_frame_size(limits.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, hub, user_id, limits.idle_timeout()))
}

async fn authenticate(state: &AppState, credential: Option<String>) -> Result<UserId, AuthError> {
    let credential = credential.ok_or(AuthError::MissingCredential)?;
    state.identity.validate(&credential).await
}

async fn handle_socket(socket: WebSocket, hub: Arc<Hub>, user_id: UserId, idle_timeout: Duration) {
    let (mut sink, stream) = socket.split();

    let (handle, outbox) = match hub.connect(user_id).await {
        Ok(registered) => registered,
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to register connection");
            let frame = ServerFrame::error("UNAVAILABLE", "chat subscriptions could not be loaded", None);
            if let Ok(text) = serde_json::to_string(&frame) {
                let _ = sink.send(Message::Text(text.into())).await;
            }
            let _ = sink.close().await;
            return;
        }
    };

    tracing::debug!(user_id = %user_id, connection_id = handle.id(), "WebSocket session started");
    run_session(sink, stream, hub, handle, outbox, idle_timeout).await;
}
