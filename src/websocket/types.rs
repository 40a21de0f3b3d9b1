use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::user::UserProfile;

/// Client-to-server events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinConversation { conversation_id: Uuid },
    LeaveConversation { conversation_id: Uuid },
    SendMessage { conversation_id: Uuid, content: String },
    TypingStart { conversation_id: Uuid },
    TypingStop { conversation_id: Uuid },
}

/// Server-to-client events. One closed union, dispatched exhaustively on
/// both ends.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    NewMessage(NewMessagePayload),
    UserTyping { user_id: Uuid, conversation_id: Uuid },
    UserStoppedTyping { user_id: Uuid, conversation_id: Uuid },
    UserOnline { user_id: Uuid },
    UserOffline { user_id: Uuid },
    Error { message: String },
}

/// The canonical persisted message as broadcast to a room: server-assigned
/// id and timestamp, plus the sender's display info.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewMessagePayload {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub sender: UserProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_events_use_snake_case_tags() {
        let user_id = Uuid::new_v4();

        let online = serde_json::to_value(ServerEvent::UserOnline { user_id }).unwrap();
        assert_eq!(online["type"], "user_online");
        assert_eq!(online["user_id"], user_id.to_string());

        let error = serde_json::to_value(ServerEvent::Error {
            message: "nope".to_string(),
        })
        .unwrap();
        assert_eq!(error["type"], "error");
    }

    #[test]
    fn new_message_carries_the_sender_block() {
        let event = ServerEvent::NewMessage(NewMessagePayload {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            content: "hello".to_string(),
            created_at: Utc::now(),
            sender: UserProfile {
                id: Uuid::new_v4(),
                name: Some("ada".to_string()),
                display_name: None,
                avatar_url: None,
            },
        });

        let value = serde_json::to_value(event).unwrap();
        assert_eq!(value["type"], "new_message");
        assert_eq!(value["sender"]["name"], "ada");
    }

    #[test]
    fn parses_client_events_off_the_wire() {
        let conversation_id = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"send_message","conversation_id":"{}","content":"hi"}}"#,
            conversation_id
        );

        let event: ClientEvent = serde_json::from_str(&raw).unwrap();
        match event {
            ClientEvent::SendMessage {
                conversation_id: id,
                content,
            } => {
                assert_eq!(id, conversation_id);
                assert_eq!(content, "hi");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_event_types() {
        let raw = r#"{"type":"drop_table","conversation_id":"x"}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }
}
