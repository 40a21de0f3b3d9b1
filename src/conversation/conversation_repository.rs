use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    conversation::{
        conversation_dto::ConversationSummary,
        conversation_models::{sort_pair, Conversation},
    },
    error::Result,
};

/// The slice of conversation persistence the realtime core depends on.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>>;
}

#[derive(Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look the pair's thread up, creating it on first contact. The sorted
    /// pair plus the unique constraint make this idempotent no matter who
    /// initiates or how often.
    pub async fn find_or_create(&self, a: Uuid, b: Uuid) -> Result<Conversation> {
        let (one, two) = sort_pair(a, b);

        let conversation = sqlx::query_as::<_, Conversation>(
            "INSERT INTO conversations (participant_one, participant_two)
             VALUES ($1, $2)
             ON CONFLICT (participant_one, participant_two)
             DO UPDATE SET participant_one = EXCLUDED.participant_one
             RETURNING *",
        )
        .bind(one)
        .bind(two)
        .fetch_one(&self.pool)
        .await?;

        Ok(conversation)
    }

    pub async fn find_for_user(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>> {
        let conversations = sqlx::query_as::<_, ConversationSummary>(
            "SELECT c.id,
                    u.id AS other_user_id,
                    u.name AS other_user_name,
                    u.display_name AS other_user_display_name,
                    u.avatar_url AS other_user_avatar_url,
                    lm.content AS last_message,
                    c.last_message_at,
                    COALESCE(un.unread_count, 0) AS unread_count
             FROM conversations c
             JOIN users u
               ON u.id = CASE WHEN c.participant_one = $1
                              THEN c.participant_two
                              ELSE c.participant_one END
             LEFT JOIN LATERAL (
                 SELECT content FROM messages m
                 WHERE m.conversation_id = c.id
                 ORDER BY m.created_at DESC
                 LIMIT 1
             ) lm ON TRUE
             LEFT JOIN LATERAL (
                 SELECT COUNT(*) AS unread_count FROM messages m
                 WHERE m.conversation_id = c.id
                   AND m.sender_id != $1
                   AND m.read_at IS NULL
             ) un ON TRUE
             WHERE c.participant_one = $1 OR c.participant_two = $1
             ORDER BY c.last_message_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations)
    }
}

#[async_trait]
impl ConversationStore for ConversationRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>> {
        let conversation =
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(conversation)
    }
}
