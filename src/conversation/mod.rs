pub mod conversation_dto;
pub mod conversation_handlers;
pub mod conversation_models;
pub mod conversation_repository;

pub use conversation_models::{sort_pair, Conversation};
pub use conversation_repository::{ConversationRepository, ConversationStore};
