use std::sync::Arc;

use uuid::Uuid;

use crate::{
    conversation::ConversationStore,
    error::{AppError, Result},
    message::{
        message_models::{validate_content, Message},
        message_repository::MessageStore,
    },
    user::{UserProfile, UserStore},
    websocket::{
        types::{NewMessagePayload, ServerEvent},
        ConnectionManager, Delivery,
    },
};

/// The single write path for chat messages: validate, authorize, persist,
/// broadcast — in that order, no step skipped or reordered.
#[derive(Clone)]
pub struct MessageService {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    users: Arc<dyn UserStore>,
    connections: ConnectionManager,
}

impl MessageService {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        users: Arc<dyn UserStore>,
        connections: ConnectionManager,
    ) -> Self {
        Self {
            conversations,
            messages,
            users,
            connections,
        }
    }

    pub async fn send_message(
        &self,
        sender_id: Uuid,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<Message> {
        let content = validate_content(content)?;

        // Room membership is never trusted as authorization; the
        // conversation record is the authority on every send.
        let conversation = self
            .conversations
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

        if !conversation.has_participant(sender_id) {
            return Err(AppError::Forbidden(
                "Not a participant of this conversation".to_string(),
            ));
        }

        let sender: UserProfile = self
            .users
            .find_by_id(sender_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sender not found".to_string()))?
            .into();

        let message = self
            .messages
            .append(conversation_id, sender_id, content)
            .await?;

        // Broadcast only once the row is durable, so any recipient can
        // immediately re-fetch the message by id. The whole room gets the
        // event, the sender's own connections included.
        self.connections
            .broadcast_room(
                conversation_id,
                None,
                Delivery::Reliable,
                ServerEvent::NewMessage(NewMessagePayload {
                    id: message.id,
                    conversation_id: message.conversation_id,
                    content: message.content.clone(),
                    created_at: message.created_at,
                    sender,
                }),
            )
            .await;

        Ok(message)
    }
}
