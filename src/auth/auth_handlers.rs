use axum::{extract::State, Json};
use chrono::Duration;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::jwt::create_token,
    error::{AppError, Result},
    middleware::AuthUser,
    state::AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct SocketTokenResponse {
    pub token: String,
}

/// Mint a short-lived token for the WebSocket handshake.
///
/// The realtime connection authenticates with this throwaway token so the
/// long-lived session credential never appears in a socket URL or log line.
#[utoipa::path(
    get,
    path = "/api/auth/socket-token",
    tag = "auth",
    responses(
        (status = 200, description = "Fresh handshake token", body = SocketTokenResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Server misconfigured")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn issue_socket_token(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SocketTokenResponse>> {
    let secret = state
        .config
        .jwt_secret
        .as_deref()
        .ok_or_else(|| AppError::Config("JWT_SECRET is not set".to_string()))?;

    let token = create_token(
        user_id,
        secret,
        Duration::minutes(state.config.socket_token_ttl_minutes),
    )?;

    Ok(Json(SocketTokenResponse { token }))
}
