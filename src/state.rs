use std::sync::Arc;

use crate::{
    conversation::ConversationRepository,
    db::DbPool,
    message::{MessageRepository, MessageService},
    user::UserRepository,
    websocket::ConnectionManager,
};

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub connections: ConnectionManager,
    pub user_repository: UserRepository,
    pub conversation_repository: ConversationRepository,
    pub message_repository: MessageRepository,
    pub message_service: MessageService,
}

#[derive(Clone)]
pub struct Config {
    /// HS256 secret shared by the token mint and the connection
    /// authenticator. Optional so a missing secret surfaces as a logged
    /// configuration fault on each rejected connection instead of a panic
    /// at startup.
    pub jwt_secret: Option<String>,
    pub socket_token_ttl_minutes: i64,
}

impl Config {
    pub fn from_env() -> Self {
        let jwt_secret = std::env::var("JWT_SECRET").ok();
        if jwt_secret.is_none() {
            tracing::warn!("JWT_SECRET is not set; every connection will be refused");
        }

        Self {
            jwt_secret,
            socket_token_ttl_minutes: std::env::var("SOCKET_TOKEN_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
        }
    }
}
