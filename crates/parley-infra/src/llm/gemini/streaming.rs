//! SSE stream creation for `streamGenerateContent?alt=sse`.
//!
//! With `alt=sse` every event is a `data:` line holding one complete
//! [`GeminiResponse`] JSON object. Text arrives as incremental slices, usage
//! metadata is cumulative, and the last chunk carries `finishReason`.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};

use parley_types::llm::{LlmError, StopReason, StreamEvent, Usage};

use super::types::{GeminiErrorEnvelope, GeminiRequest, GeminiResponse};

/// Map a Gemini `finishReason` onto the provider-neutral stop reason.
pub(crate) fn map_finish_reason(reason: &str) -> StopReason {
    match reason {
        "MAX_TOKENS" => StopReason::MaxTokens,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII"
        | "IMAGE_SAFETY" => StopReason::ContentFilter,
        _ => StopReason::EndTurn,
    }
}

/// Map a non-success HTTP response to an [`LlmError`].
///
/// Gemini reports a bad key as `400 INVALID_ARGUMENT`, so the error body is
/// inspected as well as the status code.
pub(crate) fn map_http_error(status: u16, body: &str) -> LlmError {
    let (message, api_status) = match serde_json::from_str::<GeminiErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.to_string(), None),
    };

    if status == 401
        || status == 403
        || message.contains("API key not valid")
        || api_status.as_deref() == Some("UNAUTHENTICATED")
    {
        return LlmError::AuthenticationFailed;
    }

    match status {
        429 => LlmError::RateLimited {
            retry_after_ms: None,
        },
        503 | 529 => LlmError::Overloaded(message),
        400 => LlmError::InvalidRequest(message),
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {message}"),
        },
    }
}

/// Convert one decoded response chunk into stream events.
pub(crate) fn process_chunk(chunk: &GeminiResponse) -> Result<Vec<StreamEvent>, LlmError> {
    if let Some(reason) = chunk
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(LlmError::Provider {
            message: format!("prompt blocked: {reason}"),
        });
    }

    let mut events = Vec::new();

    let text = chunk.text();
    if !text.is_empty() {
        events.push(StreamEvent::TextDelta { text });
    }

    if let Some(reason) = chunk.finish_reason() {
        if let Some(usage) = &chunk.usage_metadata {
            events.push(StreamEvent::Usage(Usage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            }));
        }
        events.push(StreamEvent::MessageDelta {
            stop_reason: map_finish_reason(reason),
        });
    }

    Ok(events)
}

fn parse_chunk(data: &str) -> Result<GeminiResponse, LlmError> {
    serde_json::from_str(data)
        .map_err(|e| LlmError::Deserialization(format!("stream chunk: {e}")))
}

/// POST `body` to `url` with the API key header and reject non-2xx replies.
pub(crate) async fn post_checked(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &GeminiRequest,
) -> Result<reqwest::Response, LlmError> {
    let response = client
        .post(url)
        .header("x-goog-api-key", api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| LlmError::Network(format!("HTTP request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, "Gemini API error response");
        return Err(map_http_error(status.as_u16(), &error_body));
    }
    Ok(response)
}

/// Decode an SSE byte stream into stream events.
///
/// Each `data` payload is one [`GeminiResponse`]. Framing, comments and
/// UTF-8 sequences split across chunks are handled by `eventsource-stream`.
pub(crate) fn decode_events<S, B, E>(
    bytes: S,
) -> impl Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::try_stream! {
        let mut frames = Box::pin(bytes.eventsource());
        while let Some(frame) = frames.next().await {
            let frame = frame.map_err(|e| LlmError::Stream(format!("response body read: {e}")))?;
            if frame.data.trim().is_empty() {
                continue;
            }
            for event in process_chunk(&parse_chunk(&frame.data)?)? {
                yield event;
            }
        }
    }
}

/// Open a streaming connection to `streamGenerateContent`.
///
/// # Arguments
///
/// * `client` - Shared reqwest HTTP client
/// * `url` - Full endpoint URL including `?alt=sse`
/// * `body` - Gemini request body
/// * `api_key` - API key wrapped in SecretString
pub fn create_gemini_stream(
    client: &reqwest::Client,
    url: &str,
    body: GeminiRequest,
    api_key: &SecretString,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
    let client = client.clone();
    let url = url.to_string();
    let api_key = api_key.expose_secret().to_string();

    Box::pin(async_stream::try_stream! {
        let response = post_checked(&client, &url, &api_key, &body).await?;
        yield StreamEvent::Connected;

        let mut events = Box::pin(decode_events(response.bytes_stream()));
        while let Some(event) = events.next().await {
            yield event?;
        }

        yield StreamEvent::Done;
    })
}
