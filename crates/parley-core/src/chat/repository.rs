//! ChatRepository trait definition.
//!
//! Provides CRUD operations for chats and their messages.

use chrono::{DateTime, Utc};
use parley_types::chat::{Chat, ChatMessage, ChatSummary};
use parley_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for chat and message persistence.
///
/// Implementations live in parley-infra (e.g., `SqliteChatRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ChatRepository: Send + Sync {
    /// Create a new chat.
    fn create_chat(
        &self,
        chat: &Chat,
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// Get a chat by its unique ID.
    fn get_chat(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Chat>, RepositoryError>> + Send;

    /// List chats with their message counts, ordered by created_at DESC.
    fn list_chats(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ChatSummary>, RepositoryError>> + Send;

    /// Update a chat's title. Returns `NotFound` for unknown chats.
    fn rename_chat(
        &self,
        chat_id: &Uuid,
        title: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a chat and (by cascade) its messages.
    fn delete_chat(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Save a new message.
    fn insert_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_message(
        &self,
        message_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ChatMessage>, RepositoryError>> + Send;

    /// Messages of a chat, ordered by timestamp ASC then id ASC.
    fn list_messages(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// Replace the text of a message (used for every streamed chunk).
    fn update_message_text(
        &self,
        message_id: &Uuid,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Replace the text of a message and flag it as an error.
    fn mark_message_error(
        &self,
        message_id: &Uuid,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn delete_message(
        &self,
        message_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete every message of a chat stamped strictly after `timestamp`.
    /// Returns the number of deleted rows.
    fn delete_messages_after(
        &self,
        chat_id: &Uuid,
        timestamp: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    fn count_messages(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u32, RepositoryError>> + Send;
}
