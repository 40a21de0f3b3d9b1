use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct FindOrCreateRequest {
    pub other_user_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FindOrCreateResponse {
    pub conversation_id: Uuid,
}

/// One row of the conversation list: the other participant, the latest
/// message and how many of their messages are still unread.
#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub other_user_id: Uuid,
    pub other_user_name: Option<String>,
    pub other_user_display_name: Option<String>,
    pub other_user_avatar_url: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Message id cursor: return the page of messages older than this one.
    pub before: Option<Uuid>,
}
