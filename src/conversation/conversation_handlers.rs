use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    conversation::{
        conversation_dto::{
            ConversationSummary, FindOrCreateRequest, FindOrCreateResponse, HistoryQuery,
        },
        ConversationStore,
    },
    error::{AppError, Result},
    message::message_models::Message,
    middleware::AuthUser,
    state::AppState,
    user::UserStore,
};

const HISTORY_PAGE_SIZE: i64 = 50;

/// Find the thread shared with another user, creating it on first contact.
/// Used by the marketplace UI's "Message" button; the realtime path never
/// creates conversations.
#[utoipa::path(
    post,
    path = "/api/conversations/find-or-create",
    tag = "conversations",
    request_body = FindOrCreateRequest,
    responses(
        (status = 200, description = "Existing or newly created conversation", body = FindOrCreateResponse),
        (status = 400, description = "Cannot converse with yourself"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Other user not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn find_or_create_conversation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<FindOrCreateRequest>,
) -> Result<impl IntoResponse> {
    if payload.other_user_id == user_id {
        return Err(AppError::BadRequest(
            "Cannot start a conversation with yourself".to_string(),
        ));
    }

    let _other = state
        .user_repository
        .find_by_id(payload.other_user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let conversation = state
        .conversation_repository
        .find_or_create(user_id, payload.other_user_id)
        .await?;

    Ok(Json(FindOrCreateResponse {
        conversation_id: conversation.id,
    }))
}

/// List the caller's conversations, most recently active first.
#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "conversations",
    responses(
        (status = 200, description = "Conversations with last message and unread count", body = Vec<ConversationSummary>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_conversations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse> {
    let conversations = state.conversation_repository.find_for_user(user_id).await?;

    Ok(Json(conversations))
}

/// Load a page of message history. Marks the other side's messages read as
/// a side effect, which is what drives the unread counts down.
#[utoipa::path(
    get,
    path = "/api/conversations/{id}/messages",
    tag = "conversations",
    params(
        ("id" = Uuid, Path, description = "Conversation id"),
        ("before" = Option<Uuid>, Query, description = "Message id cursor for older pages")
    ),
    responses(
        (status = 200, description = "Messages in chronological order", body = Vec<Message>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Conversation not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_conversation_messages(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse> {
    let conversation = state
        .conversation_repository
        .find_by_id(conversation_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

    if !conversation.has_participant(user_id) {
        return Err(AppError::Forbidden(
            "Not a participant of this conversation".to_string(),
        ));
    }

    let messages = state
        .message_repository
        .history(conversation_id, query.before, HISTORY_PAGE_SIZE)
        .await?;

    state
        .message_repository
        .mark_conversation_read(conversation_id, user_id)
        .await?;

    Ok((StatusCode::OK, Json(messages)))
}
