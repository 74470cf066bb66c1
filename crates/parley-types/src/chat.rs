//! Chat and message types for Parley.
//!
//! A `Chat` is a conversation bound to one persona. Each `ChatMessage` is a
//! row in that conversation, sent either by the user or by the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Title given to every freshly created chat.
pub const DEFAULT_CHAT_TITLE: &str = "New chat";

/// Text of the model row while the first chunk has not arrived yet.
pub const PLACEHOLDER_TEXT: &str = "...";

/// Who authored a message.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (sender IN ('user', 'model'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Model,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Model => write!(f, "model"),
        }
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Sender::User),
            "model" => Ok(Sender::Model),
            other => Err(format!("invalid sender: '{other}'")),
        }
    }
}

/// A conversation with a persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub title: String,
    pub persona_id: String,
    pub created_at: DateTime<Utc>,
}

/// A chat together with the number of messages it holds (list view).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    #[serde(flatten)]
    pub chat: Chat,
    pub message_count: u32,
}

/// A single message within a chat.
///
/// Messages are ordered by `timestamp` (millisecond precision), then `id`.
/// Model messages record which provider and model produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatMessage {
    /// Build a user message stamped with the current time.
    pub fn user(chat_id: Uuid, text: impl Into<String>, image_path: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            chat_id,
            text: text.into(),
            sender: Sender::User,
            timestamp: Utc::now(),
            is_error: false,
            image_path,
            provider: None,
            model: None,
        }
    }

    /// Build the model placeholder row that a streaming turn fills in.
    pub fn model_placeholder(
        chat_id: Uuid,
        timestamp: DateTime<Utc>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            chat_id,
            text: PLACEHOLDER_TEXT.to_string(),
            sender: Sender::Model,
            timestamp,
            is_error: false,
            image_path: None,
            provider: Some(provider.into()),
            model: Some(model.into()),
        }
    }
}

/// Export format for a chat transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Json,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Markdown => write!(f, "markdown"),
            ExportFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("invalid export format: '{other}'")),
        }
    }
}
