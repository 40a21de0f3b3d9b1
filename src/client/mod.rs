//! Client-side connection manager for the realtime channel.
//!
//! One shared connection per client process: fetches a short-lived socket
//! token with the session credential, opens the WebSocket, re-exposes
//! server events to subscribers, dedupes redelivered messages and
//! debounces outbound typing signals.

pub mod typing;

pub use typing::TypingDebouncer;

use std::collections::HashSet;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite};
use uuid::Uuid;

use crate::websocket::types::{ClientEvent, ServerEvent};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to fetch socket token: {0}")]
    TokenFetch(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    WebSocket(#[from] tungstenite::Error),
    #[error("connection closed")]
    Closed,
}

#[derive(Debug, serde::Deserialize)]
struct SocketTokenResponse {
    token: String,
}

pub struct ChatClient {
    outbound: mpsc::Sender<ClientEvent>,
    events: broadcast::Sender<ServerEvent>,
    typing: TypingDebouncer,
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl ChatClient {
    /// Fetch a handshake token with the session credential, then open the
    /// realtime connection. The session token itself never rides the
    /// socket URL.
    pub async fn connect(base_url: &str, session_token: &str) -> Result<ChatClient, ClientError> {
        let http = reqwest::Client::new();
        let response = http
            .get(format!("{}/api/auth/socket-token", base_url))
            .bearer_auth(session_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::TokenFetch(format!(
                "status {}",
                response.status()
            )));
        }
        let SocketTokenResponse { token } = response.json().await?;

        let ws_url = format!(
            "{}/api/ws?token={}",
            base_url.replacen("http", "ws", 1),
            token
        );
        let (socket, _) = connect_async(&ws_url).await?;
        let (mut sink, mut stream) = socket.split();

        let (events, _) = broadcast::channel(256);
        let (outbound, mut outbound_rx) = mpsc::channel::<ClientEvent>(64);

        // Reader: decode server events, drop duplicate messages by
        // persisted id (reconnects can redeliver), re-expose the rest.
        let dispatch = events.clone();
        let read_task = tokio::spawn(async move {
            let mut seen = SeenMessages::new();
            while let Some(Ok(frame)) = stream.next().await {
                let tungstenite::Message::Text(text) = frame else {
                    continue;
                };
                let event: ServerEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!("unparseable server event: {}", e);
                        continue;
                    }
                };
                if let ServerEvent::NewMessage(message) = &event {
                    if !seen.insert(message.id) {
                        continue;
                    }
                }
                let _ = dispatch.send(event);
            }
        });

        let write_task = tokio::spawn(async move {
            while let Some(event) = outbound_rx.recv().await {
                let Ok(json) = serde_json::to_string(&event) else {
                    continue;
                };
                if sink.send(tungstenite::Message::Text(json)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let typing = TypingDebouncer::new(outbound.clone());

        Ok(ChatClient {
            outbound,
            events,
            typing,
            read_task,
            write_task,
        })
    }

    /// Register a subscriber for server events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    pub async fn join_conversation(&self, conversation_id: Uuid) -> Result<(), ClientError> {
        self.send(ClientEvent::JoinConversation { conversation_id })
            .await
    }

    pub async fn leave_conversation(&self, conversation_id: Uuid) -> Result<(), ClientError> {
        self.send(ClientEvent::LeaveConversation { conversation_id })
            .await
    }

    /// Send a chat message. Any pending typing indicator for the
    /// conversation stops immediately.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<(), ClientError> {
        self.typing.message_sent(conversation_id).await;
        self.send(ClientEvent::SendMessage {
            conversation_id,
            content: content.to_string(),
        })
        .await
    }

    /// Report a keystroke: emits `typing_start` on the first one after
    /// idle and schedules the trailing `typing_stop`.
    pub async fn keystroke(&self, conversation_id: Uuid) {
        self.typing.keystroke(conversation_id).await;
    }

    async fn send(&self, event: ClientEvent) -> Result<(), ClientError> {
        self.outbound.send(event).await.map_err(|_| ClientError::Closed)
    }
}

impl Drop for ChatClient {
    /// Full teardown: dropping the client (e.g. on sign-out) kills both
    /// socket tasks.
    fn drop(&mut self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

/// Ids of messages already handed to subscribers.
struct SeenMessages {
    ids: HashSet<Uuid>,
}

impl SeenMessages {
    fn new() -> Self {
        Self {
            ids: HashSet::new(),
        }
    }

    /// Returns false when the id was already seen.
    fn insert(&mut self, id: Uuid) -> bool {
        self.ids.insert(id)
    }
}
