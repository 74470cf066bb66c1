//! Adapter from `async-openai` chunk streams to [`StreamEvent`]s.

use std::pin::Pin;

use async_openai::types::chat::{
    ChatCompletionResponseStream, CreateChatCompletionStreamResponse, FinishReason,
};
use futures_util::{Stream, StreamExt};

use parley_types::llm::{LlmError, StopReason, StreamEvent, Usage};

pub(crate) fn map_finish_reason(reason: &FinishReason) -> StopReason {
    match reason {
        FinishReason::Length => StopReason::MaxTokens,
        FinishReason::ContentFilter => StopReason::ContentFilter,
        _ => StopReason::EndTurn,
    }
}

/// Events carried by one streamed chunk, in emission order.
///
/// The usage chunk (requested via `stream_options`) arrives last with no choices.
pub(crate) fn chunk_events(chunk: &CreateChatCompletionStreamResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    for choice in &chunk.choices {
        if let Some(text) = choice.delta.content.as_deref().filter(|t| !t.is_empty()) {
            events.push(StreamEvent::TextDelta {
                text: text.to_string(),
            });
        }
        if let Some(reason) = &choice.finish_reason {
            events.push(StreamEvent::MessageDelta {
                stop_reason: map_finish_reason(reason),
            });
        }
    }

    if let Some(usage) = &chunk.usage {
        events.push(StreamEvent::Usage(Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }));
    }

    events
}

/// Wrap a chunk stream: `Connected`, then per-chunk events, then `Done`.
pub fn map_openai_stream(
    mut chunks: ChatCompletionResponseStream,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
    Box::pin(async_stream::try_stream! {
        yield StreamEvent::Connected;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| LlmError::Stream(e.to_string()))?;
            for event in chunk_events(&chunk) {
                yield event;
            }
        }

        yield StreamEvent::Done;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(value: serde_json::Value) -> CreateChatCompletionStreamResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_finish_reasons() {
        assert_eq!(map_finish_reason(&FinishReason::Stop), StopReason::EndTurn);
        assert_eq!(map_finish_reason(&FinishReason::Length), StopReason::MaxTokens);
        assert_eq!(
            map_finish_reason(&FinishReason::ContentFilter),
            StopReason::ContentFilter
        );
    }

    #[test]
    fn test_text_chunk_then_finish() {
        let events = chunk_events(&chunk(serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "delta": { "content": "Ahoy" },
                "finish_reason": "length"
            }]
        })));

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::TextDelta { text } if text == "Ahoy"));
        assert!(matches!(
            events[1],
            StreamEvent::MessageDelta {
                stop_reason: StopReason::MaxTokens
            }
        ));
    }

    #[test]
    fn test_usage_chunk_without_choices() {
        let events = chunk_events(&chunk(serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": "gpt-4o",
            "choices": [],
            "usage": { "prompt_tokens": 12, "completion_tokens": 34, "total_tokens": 46 }
        })));

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            StreamEvent::Usage(usage) if usage.input_tokens == 12 && usage.output_tokens == 34
        ));
    }
}
