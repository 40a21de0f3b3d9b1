use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{error::Result, message::message_models::Message};

/// The single persistence operation of the realtime write path.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert a message row and bump the conversation's last activity in
    /// one transaction. A message counts as sent only when both land.
    async fn append(&self, conversation_id: Uuid, sender_id: Uuid, content: &str)
        -> Result<Message>;
}

#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A page of history in chronological order, optionally the page of
    /// messages older than `before`.
    pub async fn history(
        &self,
        conversation_id: Uuid,
        before: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Message>> {
        let mut messages = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages
             WHERE conversation_id = $1
               AND ($2::uuid IS NULL
                    OR created_at < (SELECT created_at FROM messages WHERE id = $2))
             ORDER BY created_at DESC
             LIMIT $3",
        )
        .bind(conversation_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        messages.reverse();
        Ok(messages)
    }

    /// Mark every message the other side sent as read.
    pub async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE messages
             SET read_at = NOW()
             WHERE conversation_id = $1 AND sender_id != $2 AND read_at IS NULL",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    async fn append(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> Result<Message> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, Message>(
            "INSERT INTO messages (conversation_id, sender_id, content)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET last_message_at = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(message)
    }
}
