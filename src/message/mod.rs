pub mod message_models;
pub mod message_repository;
pub mod message_service;

pub use message_models::{validate_content, Message, MAX_MESSAGE_LENGTH};
pub use message_repository::{MessageRepository, MessageStore};
pub use message_service::MessageService;
