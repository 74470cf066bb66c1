//! Events and outcomes of a single model turn.

use parley_types::llm::Usage;
use uuid::Uuid;

/// Progress of a streaming turn, forwarded to the front end as it happens.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// The placeholder row exists; its id is what later events refer to.
    Started { message_id: Uuid },
    /// A chunk of response text.
    Delta { text: String },
    /// Token usage reported by the provider.
    Usage(Usage),
    /// The turn failed; the row now holds `Error: <message>`.
    Failed { message: String },
    /// The chat received an automatic title.
    TitleGenerated { title: String },
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed { message_id: Uuid, text: String },
    /// Stopped by the user. An empty `text` means nothing arrived and the
    /// placeholder row was removed.
    Cancelled { message_id: Uuid, text: String },
    Failed { message_id: Uuid, error: String },
}

impl TurnOutcome {
    pub fn message_id(&self) -> Uuid {
        match self {
            TurnOutcome::Completed { message_id, .. }
            | TurnOutcome::Cancelled { message_id, .. }
            | TurnOutcome::Failed { message_id, .. } => *message_id,
        }
    }
}
