//! Chats and messages in SQLite.
//!
//! Reads use the reader pool, writes the single writer connection. Deleting a
//! chat removes its messages through the `ON DELETE CASCADE` foreign key.

use chrono::{DateTime, Utc};
use parley_core::chat::repository::ChatRepository;
use parley_types::chat::{Chat, ChatMessage, ChatSummary, Sender};
use parley_types::error::RepositoryError;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{from_millis, query_error, require_match, to_millis};

const MESSAGE_COLUMNS: &str =
    "id, chat_id, text, sender, timestamp, is_error, image_path, provider, model";

pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Run a single-message UPDATE/DELETE whose last placeholder is the message id.
    async fn execute_on_message(
        &self,
        sql: &str,
        message_id: &Uuid,
        text: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut query = sqlx::query(sql);
        if let Some(text) = text {
            query = query.bind(text);
        }
        let result = query
            .bind(message_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        require_match(result)
    }
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(raw).map_err(|e| RepositoryError::Query(format!("bad {what} '{raw}': {e}")))
}

#[derive(sqlx::FromRow)]
struct ChatRow {
    id: String,
    title: String,
    persona_id: String,
    created_at: i64,
}

impl TryFrom<ChatRow> for Chat {
    type Error = RepositoryError;

    fn try_from(row: ChatRow) -> Result<Self, Self::Error> {
        Ok(Chat {
            id: parse_id(&row.id, "chat id")?,
            title: row.title,
            persona_id: row.persona_id,
            created_at: from_millis(row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    chat: ChatRow,
    message_count: i64,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    chat_id: String,
    text: String,
    sender: String,
    timestamp: i64,
    is_error: bool,
    image_path: Option<String>,
    provider: Option<String>,
    model: Option<String>,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = RepositoryError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let sender: Sender = row.sender.parse().map_err(RepositoryError::Query)?;
        Ok(ChatMessage {
            id: parse_id(&row.id, "message id")?,
            chat_id: parse_id(&row.chat_id, "chat id")?,
            text: row.text,
            sender,
            timestamp: from_millis(row.timestamp)?,
            is_error: row.is_error,
            image_path: row.image_path,
            provider: row.provider,
            model: row.model,
        })
    }
}

impl ChatRepository for SqliteChatRepository {
    async fn create_chat(&self, chat: &Chat) -> Result<Chat, RepositoryError> {
        sqlx::query("INSERT INTO chats (id, title, persona_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(chat.id.to_string())
            .bind(&chat.title)
            .bind(&chat.persona_id)
            .bind(to_millis(&chat.created_at))
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(chat.clone())
    }

    async fn get_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        sqlx::query_as::<_, ChatRow>("SELECT id, title, persona_id, created_at FROM chats WHERE id = ?")
            .bind(chat_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?
            .map(Chat::try_from)
            .transpose()
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"SELECT c.id, c.title, c.persona_id, c.created_at, COUNT(m.id) AS message_count
               FROM chats c
               LEFT JOIN messages m ON m.chat_id = c.id
               GROUP BY c.id
               ORDER BY c.created_at DESC, c.id DESC"#,
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(ChatSummary {
                    chat: row.chat.try_into()?,
                    message_count: u32::try_from(row.message_count).unwrap_or(u32::MAX),
                })
            })
            .collect()
    }

    async fn rename_chat(&self, chat_id: &Uuid, title: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE chats SET title = ? WHERE id = ?")
            .bind(title)
            .bind(chat_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        require_match(result)
    }

    async fn delete_chat(&self, chat_id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(chat_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        require_match(result)
    }

    async fn insert_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        let sql = format!("INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)");
        sqlx::query(&sql)
            .bind(message.id.to_string())
            .bind(message.chat_id.to_string())
            .bind(&message.text)
            .bind(message.sender.to_string())
            .bind(to_millis(&message.timestamp))
            .bind(message.is_error)
            .bind(&message.image_path)
            .bind(&message.provider)
            .bind(&message.model)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn get_message(&self, message_id: &Uuid) -> Result<Option<ChatMessage>, RepositoryError> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?");
        sqlx::query_as::<_, MessageRow>(&sql)
            .bind(message_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?
            .map(ChatMessage::try_from)
            .transpose()
    }

    async fn list_messages(&self, chat_id: &Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = ? ORDER BY timestamp, id"
        );
        sqlx::query_as::<_, MessageRow>(&sql)
            .bind(chat_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?
            .into_iter()
            .map(ChatMessage::try_from)
            .collect()
    }

    async fn update_message_text(&self, message_id: &Uuid, text: &str) -> Result<(), RepositoryError> {
        self.execute_on_message("UPDATE messages SET text = ? WHERE id = ?", message_id, Some(text))
            .await
    }

    async fn mark_message_error(&self, message_id: &Uuid, text: &str) -> Result<(), RepositoryError> {
        self.execute_on_message(
            "UPDATE messages SET text = ?, is_error = 1 WHERE id = ?",
            message_id,
            Some(text),
        )
        .await
    }

    async fn delete_message(&self, message_id: &Uuid) -> Result<(), RepositoryError> {
        self.execute_on_message("DELETE FROM messages WHERE id = ?", message_id, None)
            .await
    }

    async fn delete_messages_after(
        &self,
        chat_id: &Uuid,
        timestamp: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM messages WHERE chat_id = ? AND timestamp > ?")
            .bind(chat_id.to_string())
            .bind(to_millis(&timestamp))
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected())
    }

    async fn count_messages(&self, chat_id: &Uuid) -> Result<u32, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE chat_id = ?")
            .bind(chat_id.to_string())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::test_support::test_pool;
    use chrono::{Duration, SubsecRound};

    fn make_chat(title: &str, created_at: DateTime<Utc>) -> Chat {
        Chat {
            id: Uuid::now_v7(),
            title: title.to_string(),
            persona_id: "alice".to_string(),
            created_at: created_at.trunc_subsecs(3),
        }
    }

    fn make_message(chat_id: Uuid, sender: Sender, text: &str, timestamp: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id: Uuid::now_v7(),
            chat_id,
            text: text.to_string(),
            sender,
            timestamp: timestamp.trunc_subsecs(3),
            is_error: false,
            image_path: None,
            provider: None,
            model: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_chat() {
        let repo = SqliteChatRepository::new(test_pool().await);
        let chat = make_chat("New chat", Utc::now());

        let created = repo.create_chat(&chat).await.unwrap();
        assert_eq!(created.id, chat.id);

        let found = repo.get_chat(&chat.id).await.unwrap().unwrap();
        assert_eq!(found.title, "New chat");
        assert_eq!(found.persona_id, "alice");
        assert_eq!(found.created_at, chat.created_at);

        assert!(repo.get_chat(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_chats_newest_first_with_counts() {
        let repo = SqliteChatRepository::new(test_pool().await);
        let now = Utc::now();
        let old = make_chat("Old", now - Duration::hours(1));
        let new = make_chat("New", now);
        repo.create_chat(&old).await.unwrap();
        repo.create_chat(&new).await.unwrap();

        repo.insert_message(&make_message(old.id, Sender::User, "hi", now))
            .await
            .unwrap();

        let chats = repo.list_chats().await.unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].chat.title, "New");
        assert_eq!(chats[0].message_count, 0);
        assert_eq!(chats[1].chat.title, "Old");
        assert_eq!(chats[1].message_count, 1);
    }

    #[tokio::test]
    async fn test_rename_chat() {
        let repo = SqliteChatRepository::new(test_pool().await);
        let chat = make_chat("New chat", Utc::now());
        repo.create_chat(&chat).await.unwrap();

        repo.rename_chat(&chat.id, "Trip planning").await.unwrap();
        let found = repo.get_chat(&chat.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Trip planning");

        let err = repo.rename_chat(&Uuid::now_v7(), "x").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_chat_cascades_messages() {
        let repo = SqliteChatRepository::new(test_pool().await);
        let chat = make_chat("Doomed", Utc::now());
        repo.create_chat(&chat).await.unwrap();
        let msg = make_message(chat.id, Sender::User, "Hello", Utc::now());
        repo.insert_message(&msg).await.unwrap();

        repo.delete_chat(&chat.id).await.unwrap();

        assert!(repo.get_chat(&chat.id).await.unwrap().is_none());
        assert!(repo.get_message(&msg.id).await.unwrap().is_none());
        assert_eq!(repo.count_messages(&chat.id).await.unwrap(), 0);

        let err = repo.delete_chat(&chat.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_message_requires_existing_chat() {
        let repo = SqliteChatRepository::new(test_pool().await);
        let orphan = make_message(Uuid::now_v7(), Sender::User, "lost", Utc::now());
        assert!(repo.insert_message(&orphan).await.is_err());
    }

    #[tokio::test]
    async fn test_insert_and_list_messages_in_order() {
        let repo = SqliteChatRepository::new(test_pool().await);
        let chat = make_chat("Ordered", Utc::now());
        repo.create_chat(&chat).await.unwrap();

        let t0 = Utc::now();
        let mut reply = make_message(chat.id, Sender::Model, "Hi there!", t0 + Duration::milliseconds(5));
        reply.provider = Some("gemini".to_string());
        reply.model = Some("gemini-2.5-flash".to_string());
        let mut question = make_message(chat.id, Sender::User, "Hello", t0);
        question.image_path = Some("/tmp/cat.png".to_string());

        // Insert out of order; listing sorts by timestamp
        repo.insert_message(&reply).await.unwrap();
        repo.insert_message(&question).await.unwrap();

        let messages = repo.list_messages(&chat.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[0].image_path.as_deref(), Some("/tmp/cat.png"));
        assert_eq!(messages[1].sender, Sender::Model);
        assert_eq!(messages[1].model.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(messages[1].timestamp, reply.timestamp);
        assert_eq!(repo.count_messages(&chat.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_and_mark_error() {
        let repo = SqliteChatRepository::new(test_pool().await);
        let chat = make_chat("Streaming", Utc::now());
        repo.create_chat(&chat).await.unwrap();
        let msg = make_message(chat.id, Sender::Model, "...", Utc::now());
        repo.insert_message(&msg).await.unwrap();

        repo.update_message_text(&msg.id, "Partial answ").await.unwrap();
        let found = repo.get_message(&msg.id).await.unwrap().unwrap();
        assert_eq!(found.text, "Partial answ");
        assert!(!found.is_error);

        repo.mark_message_error(&msg.id, "Error: boom").await.unwrap();
        let found = repo.get_message(&msg.id).await.unwrap().unwrap();
        assert_eq!(found.text, "Error: boom");
        assert!(found.is_error);

        let err = repo
            .update_message_text(&Uuid::now_v7(), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_messages_after() {
        let repo = SqliteChatRepository::new(test_pool().await);
        let chat = make_chat("Fork", Utc::now());
        let other = make_chat("Other", Utc::now());
        repo.create_chat(&chat).await.unwrap();
        repo.create_chat(&other).await.unwrap();

        let t0 = Utc::now().trunc_subsecs(3);
        let msgs: Vec<ChatMessage> = (0..4)
            .map(|i| make_message(chat.id, Sender::User, &format!("m{i}"), t0 + Duration::milliseconds(i)))
            .collect();
        for m in &msgs {
            repo.insert_message(m).await.unwrap();
        }
        let foreign = make_message(other.id, Sender::User, "keep", t0 + Duration::seconds(1));
        repo.insert_message(&foreign).await.unwrap();

        let removed = repo.delete_messages_after(&chat.id, msgs[1].timestamp).await.unwrap();
        assert_eq!(removed, 2);

        let left: Vec<String> = repo
            .list_messages(&chat.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(left, vec!["m0", "m1"]);
        assert_eq!(repo.count_messages(&other.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_message() {
        let repo = SqliteChatRepository::new(test_pool().await);
        let chat = make_chat("Delete", Utc::now());
        repo.create_chat(&chat).await.unwrap();
        let msg = make_message(chat.id, Sender::User, "bye", Utc::now());
        repo.insert_message(&msg).await.unwrap();

        repo.delete_message(&msg.id).await.unwrap();
        assert!(repo.get_message(&msg.id).await.unwrap().is_none());

        let err = repo.delete_message(&msg.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
