//! GeminiProvider -- concrete [`LlmProvider`] for the Google Generative Language API.
//!
//! Talks to `models/{model}:generateContent` and
//! `models/{model}:streamGenerateContent?alt=sse` over plain REST. The API
//! key travels in the `x-goog-api-key` header, never in the URL.

use std::time::Duration;

use base64::Engine;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};

use parley_core::llm::provider::{EventStream, LlmProvider};
use parley_types::llm::{
    CompletionRequest, CompletionResponse, ImageAttachment, LlmError, MessageRole,
    ProviderCapabilities, StopReason, Usage,
};

use super::streaming::{create_gemini_stream, map_finish_reason, post_checked};
use super::types::{GeminiContent, GeminiPart, GeminiRequest, GeminiResponse, GenerationConfig};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini LLM provider.
///
/// Does NOT derive Debug: it holds the API key.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    capabilities: ProviderCapabilities,
}

impl GeminiProvider {
    pub fn new(api_key: SecretString, model: String, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model,
            capabilities: ProviderCapabilities {
                streaming: true,
                vision: true,
                max_context_tokens: 1_000_000,
                max_output_tokens: 8_192,
            },
        })
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn model_for<'a>(&'a self, request: &'a CompletionRequest) -> &'a str {
        if request.model.is_empty() {
            &self.model
        } else {
            &request.model
        }
    }

    fn url(&self, model: &str, method: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        match method {
            "streamGenerateContent" => format!("{base}/models/{model}:{method}?alt=sse"),
            _ => format!("{base}/models/{model}:{method}"),
        }
    }
}

/// Convert a generic [`CompletionRequest`] into a [`GeminiRequest`].
///
/// Assistant turns become role `model`. Attached images are read from disk
/// and sent inline; an unreadable image is logged and the text goes alone.
pub(crate) async fn build_request(request: &CompletionRequest) -> GeminiRequest {
    let mut contents = Vec::with_capacity(request.messages.len());
    let mut system_parts: Vec<GeminiPart> = request
        .system
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| GeminiPart::text(s.as_str()))
        .collect();

    for msg in &request.messages {
        let role = match msg.role {
            MessageRole::System => {
                system_parts.push(GeminiPart::text(msg.content.as_str()));
                continue;
            }
            MessageRole::User => "user",
            MessageRole::Assistant => "model",
        };

        let mut parts = Vec::with_capacity(2);
        if let Some(image) = &msg.image {
            match inline_image(image).await {
                Ok(part) => parts.push(part),
                Err(e) => tracing::warn!(path = %image.path, error = %e, "Failed to load image attachment"),
            }
        }
        if !msg.content.is_empty() || parts.is_empty() {
            parts.push(GeminiPart::text(msg.content.as_str()));
        }

        contents.push(GeminiContent {
            role: Some(role.to_string()),
            parts,
        });
    }

    GeminiRequest {
        contents,
        system_instruction: (!system_parts.is_empty()).then(|| GeminiContent {
            role: None,
            parts: system_parts,
        }),
        generation_config: GenerationConfig {
            max_output_tokens: request.max_tokens,
            temperature: request.temperature,
        },
    }
}

async fn inline_image(image: &ImageAttachment) -> std::io::Result<GeminiPart> {
    let bytes = tokio::fs::read(&image.path).await?;
    let data = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(GeminiPart::inline(image.mime_type.as_str(), data))
}

impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let model = self.model_for(request).to_string();
        let body = build_request(request).await;
        let url = self.url(&model, "generateContent");

        let response = post_checked(&self.client, &url, self.api_key.expose_secret(), &body).await?;

        let gemini_resp: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        if let Some(reason) = gemini_resp
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(LlmError::Provider {
                message: format!("prompt blocked: {reason}"),
            });
        }

        let usage = gemini_resp
            .usage_metadata
            .as_ref()
            .map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: gemini_resp.response_id.clone().unwrap_or_default(),
            content: gemini_resp.text(),
            model: gemini_resp.model_version.clone().unwrap_or(model),
            stop_reason: gemini_resp
                .finish_reason()
                .map(map_finish_reason)
                .unwrap_or(StopReason::EndTurn),
            usage,
        })
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        let url = self.url(self.model_for(&request), "streamGenerateContent");
        let client = self.client.clone();
        let api_key = SecretString::from(self.api_key.expose_secret().to_owned());

        Box::pin(async_stream::try_stream! {
            let body = build_request(&request).await;
            let mut inner = create_gemini_stream(&client, &url, body, &api_key);
            while let Some(event) = inner.next().await {
                yield event?;
            }
        })
    }
}
