use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    conversation::ConversationStore,
    error::AppError,
    middleware::AuthUser,
    state::AppState,
    websocket::{
        connection::{ConnectionManager, Delivery, WsSender, OUTBOUND_BUFFER},
        types::{ClientEvent, ServerEvent},
    },
};

const HEARTBEAT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

/// Realtime messaging endpoint.
///
/// The bearer token was already checked by the auth middleware, so a
/// refused credential never reaches this point; everything below runs with
/// an authenticated user id.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: Uuid, state: AppState) {
    let connection_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOUND_BUFFER);

    if state.connections.register(connection_id, user_id, tx.clone()) {
        state
            .connections
            .broadcast_all(ServerEvent::UserOnline { user_id })
            .await;
    }
    tracing::info!("user {} connected (connection {})", user_id, connection_id);

    // Writer: drain the outbound queue into the socket, with a
    // protocol-level ping as keep-alive.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await; // the first tick is immediate
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    let Ok(json) = serde_json::to_string(&event) else { continue };
                    if sink.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader: decode client events and dispatch them.
    let recv_state = state.clone();
    let recv_tx = tx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            match frame {
                Message::Text(text) => {
                    process_client_event(&text, connection_id, user_id, &recv_state, &recv_tx)
                        .await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Closing fires the disconnect path immediately; an in-flight send in
    // another task simply broadcasts to a shrunk room afterwards.
    if state.connections.unregister(connection_id) {
        state
            .connections
            .broadcast_all(ServerEvent::UserOffline { user_id })
            .await;
    }
    tracing::info!(
        "user {} disconnected (connection {})",
        user_id,
        connection_id
    );
}

async fn process_client_event(
    text: &str,
    connection_id: Uuid,
    user_id: Uuid,
    state: &AppState,
    tx: &WsSender,
) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            let _ = tx
                .send(ServerEvent::Error {
                    message: format!("Invalid event format: {}", e),
                })
                .await;
            return;
        }
    };

    match event {
        ClientEvent::JoinConversation { conversation_id } => {
            if let Err(e) = join_conversation(
                &state.conversation_repository,
                &state.connections,
                conversation_id,
                connection_id,
                user_id,
            )
            .await
            {
                send_error(tx, e, "Failed to join conversation").await;
            } else {
                tracing::debug!("user {} joined conversation {}", user_id, conversation_id);
            }
        }

        ClientEvent::LeaveConversation { conversation_id } => {
            state.connections.leave_room(conversation_id, connection_id);
            tracing::debug!("user {} left conversation {}", user_id, conversation_id);
        }

        ClientEvent::SendMessage {
            conversation_id,
            content,
        } => {
            if let Err(e) = state
                .message_service
                .send_message(user_id, conversation_id, &content)
                .await
            {
                send_error(tx, e, "Failed to send message").await;
            }
        }

        ClientEvent::TypingStart { conversation_id } => {
            state
                .connections
                .broadcast_room(
                    conversation_id,
                    Some(connection_id),
                    Delivery::BestEffort,
                    ServerEvent::UserTyping {
                        user_id,
                        conversation_id,
                    },
                )
                .await;
        }

        ClientEvent::TypingStop { conversation_id } => {
            state
                .connections
                .broadcast_room(
                    conversation_id,
                    Some(connection_id),
                    Delivery::Reliable,
                    ServerEvent::UserStoppedTyping {
                        user_id,
                        conversation_id,
                    },
                )
                .await;
        }
    }
}

/// Room admission: the conversation must exist and the requester must be
/// one of its two participants. Membership is fan-out state only; the send
/// path re-checks authorization on every message.
async fn join_conversation(
    conversations: &dyn ConversationStore,
    connections: &ConnectionManager,
    conversation_id: Uuid,
    connection_id: Uuid,
    user_id: Uuid,
) -> crate::error::Result<()> {
    let conversation = conversations
        .find_by_id(conversation_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

    if !conversation.has_participant(user_id) {
        return Err(AppError::Forbidden(
            "Not a participant of this conversation".to_string(),
        ));
    }

    connections.join_room(conversation_id, connection_id);
    Ok(())
}

/// Convert a handler error into one error event for the originating
/// connection. Database and configuration faults are logged and replaced
/// with an opaque message; nothing here ever terminates other connections.
async fn send_error(tx: &WsSender, err: AppError, fallback: &str) {
    let message = match &err {
        AppError::Database(e) => {
            tracing::error!("database error: {}", e);
            fallback.to_string()
        }
        AppError::Config(detail) => {
            tracing::error!("configuration fault: {}", detail);
            "Server error".to_string()
        }
        other => other.to_string(),
    };

    let _ = tx.send(ServerEvent::Error { message }).await;
}
