use thiserror::Error;

use crate::llm::LlmError;

/// Errors from persona lookups.
#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("persona '{0}' not found")]
    NotFound(String),

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("invalid persona catalog: {0}")]
    InvalidCatalog(String),
}

/// Errors from repository operations (used by trait definitions in parley-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from chat operations and model turns.
///
/// The `Display` text of a turn failure is what ends up in the error row
/// shown to the user, so messages here are user-facing.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat not found")]
    ChatNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("No user message found to respond to.")]
    NoUserMessage,

    #[error("API Key for provider {0} not found!")]
    MissingApiKey(String),

    #[error("{0}")]
    Llm(#[from] LlmError),

    #[error("{0}")]
    Persona(#[from] PersonaError),

    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("export failed: {0}")]
    Export(String),
}
