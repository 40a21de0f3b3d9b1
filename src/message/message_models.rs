use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// A persisted chat message. Immutable once created; `read_at` is the only
/// column that ever changes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Check an incoming message body and return the trimmed content.
///
/// Runs before any persistence or broadcast; a violation reaches only the
/// sender.
pub fn validate_content(raw: &str) -> crate::error::Result<&str> {
    if raw.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(crate::error::AppError::Validation(format!(
            "Message too long (max {} characters)",
            MAX_MESSAGE_LENGTH
        )));
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(crate::error::AppError::Validation(
            "Message cannot be empty".to_string(),
        ));
    }

    Ok(trimmed)
}
