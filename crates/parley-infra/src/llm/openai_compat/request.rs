//! Conversion from [`CompletionRequest`] to the OpenAI chat request body.

use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionStreamOptions,
    CreateChatCompletionRequest,
};

use parley_types::llm::{CompletionRequest, Message, MessageRole};

/// Build the chat completions body. Image attachments are not carried over.
///
/// A blank `request.model` falls back to `default_model`. Streaming requests
/// ask for a trailing usage chunk.
pub(crate) fn chat_request(
    request: &CompletionRequest,
    default_model: &str,
    stream: bool,
) -> CreateChatCompletionRequest {
    let messages = request
        .system
        .iter()
        .filter(|system| !system.trim().is_empty())
        .map(|system| system_message(system))
        .chain(request.messages.iter().map(to_openai_message))
        .collect();

    let model = if request.model.trim().is_empty() {
        default_model
    } else {
        &request.model
    };

    CreateChatCompletionRequest {
        model: model.to_string(),
        messages,
        max_completion_tokens: Some(request.max_tokens),
        temperature: request.temperature.map(|t| t as f32),
        stream: stream.then_some(true),
        stream_options: stream.then_some(ChatCompletionStreamOptions {
            include_usage: Some(true),
            include_obfuscation: None,
        }),
        ..Default::default()
    }
}

fn to_openai_message(message: &Message) -> ChatCompletionRequestMessage {
    let text = message.content.clone();
    match message.role {
        MessageRole::System => system_message(&text),
        MessageRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(text),
            name: None,
        }),
        #[allow(deprecated)]
        MessageRole::Assistant => {
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(ChatCompletionRequestAssistantMessageContent::Text(text)),
                refusal: None,
                name: None,
                audio: None,
                tool_calls: None,
                function_call: None,
            })
        }
    }
}

fn system_message(text: &str) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
        content: ChatCompletionRequestSystemMessageContent::Text(text.to_string()),
        name: None,
    })
}
