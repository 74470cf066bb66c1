//! Prompt assembly for a chat turn.
//!
//! Turns stored chat rows into the provider-neutral `Message` list and
//! builds the system prompt from the persona and the response length.

use parley_types::chat::{ChatMessage, PLACEHOLDER_TEXT, Sender};
use parley_types::error::ChatError;
use parley_types::llm::{ImageAttachment, Message, MessageRole};
use parley_types::provider::ApiProvider;
use parley_types::settings::ResponseLength;

/// Persona prompt followed by the response-length instruction.
pub fn system_prompt(persona_prompt: &str, length: ResponseLength) -> String {
    format!("{persona_prompt}{}", length.instruction())
}

/// Split a chat into the history and the user message a turn answers.
///
/// The user message is the last one sent by the user. History is every
/// message before it, minus error rows and unfinished placeholders.
pub fn split_for_turn(
    messages: &[ChatMessage],
) -> Result<(Vec<&ChatMessage>, &ChatMessage), ChatError> {
    let user_idx = messages
        .iter()
        .rposition(|m| m.sender == Sender::User)
        .ok_or(ChatError::NoUserMessage)?;

    let history = messages[..user_idx]
        .iter()
        .filter(|m| !m.is_error)
        .filter(|m| !m.text.trim().is_empty() && m.text != PLACEHOLDER_TEXT)
        .collect();

    Ok((history, &messages[user_idx]))
}

/// Build the provider message list for a turn.
///
/// Gemini sees images only on the current user message; history rows that
/// carried an image are left out for it entirely.
pub fn build_messages(
    provider: ApiProvider,
    history: &[&ChatMessage],
    user_message: &ChatMessage,
) -> Vec<Message> {
    let skip_image_history = provider == ApiProvider::Gemini;

    let mut messages: Vec<Message> = history
        .iter()
        .filter(|m| !(skip_image_history && m.image_path.is_some()))
        .map(|m| to_message(m))
        .collect();

    let mut current = to_message(user_message);
    current.image = user_message
        .image_path
        .as_deref()
        .and_then(ImageAttachment::from_path);
    messages.push(current);
    messages
}

fn to_message(message: &ChatMessage) -> Message {
    Message {
        role: match message.sender {
            Sender::User => MessageRole::User,
            Sender::Model => MessageRole::Assistant,
        },
        content: message.text.clone(),
        image: None,
    }
}

/// Render a transcript as `SENDER: text` lines (title generation input).
pub fn conversation_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter(|m| !m.is_error)
        .map(|m| format!("{}: {}", m.sender.to_string().to_uppercase(), m.text))
        .collect::<Vec<_>>()
        .join("\n")
}
