//! Chat title generation via LLM.
//!
//! `generate_title` asks the active provider's cheap model for a short,
//! descriptive title based on the conversation so far.

use parley_types::llm::{CompletionRequest, LlmError, Message};

use crate::llm::box_provider::BoxLlmProvider;

const TITLE_INSTRUCTION: &str =
    "Summarize the following conversation with a short, descriptive title (3-5 words).";

fn title_prompt(conversation: &str, language: Option<&str>) -> String {
    let language_line = match language {
        Some(lang) => format!(" The title should be in {lang}."),
        None => " The title should be in the language of the conversation.".to_string(),
    };
    format!("{TITLE_INSTRUCTION}{language_line}\nConversation:\n{conversation}\nTitle:")
}

/// Strip whitespace and surrounding quotes from a model-produced title.
pub fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim()
        .to_string()
}

/// Generate a chat title from the rendered conversation.
///
/// Returns `Ok(None)` when the model answers with nothing usable.
#[tracing::instrument(name = "generate_title", skip(provider, conversation), fields(model = %model))]
pub async fn generate_title(
    provider: &BoxLlmProvider,
    conversation: &str,
    model: &str,
    language: Option<&str>,
) -> Result<Option<String>, LlmError> {
    let request = CompletionRequest {
        model: model.to_string(),
        messages: vec![Message::user(title_prompt(conversation, language))],
        system: None,
        max_tokens: 50,
        temperature: Some(0.3),
        stream: false,
    };

    let response = provider.complete(&request).await?;
    let title = clean_title(&response.content);

    Ok((!title.is_empty()).then_some(title))
}
