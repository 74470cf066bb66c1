//! OpenAI-compatible LLM provider.
//!
//! One [`OpenAiCompatibleProvider`] serves OpenRouter, OpenAI, DeepSeek and
//! Together; only the [`Vendor`] (base URL and limits) differs. Requests and
//! SSE streaming go through `async-openai`.

mod error;
mod request;
pub mod streaming;
pub mod vendor;

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use parley_core::llm::provider::{EventStream, LlmProvider};
use parley_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason, Usage,
};
use parley_types::provider::ApiProvider;

use self::error::map_openai_error;
use self::request::chat_request;
use self::streaming::{map_finish_reason, map_openai_stream};
pub use self::vendor::Vendor;

/// Chat client for one vendor and model.
///
/// Does NOT derive Debug: the `async_openai::Client` holds the API key.
pub struct OpenAiCompatibleProvider {
    client: Client<OpenAIConfig>,
    vendor: &'static Vendor,
    model: String,
    capabilities: ProviderCapabilities,
}

impl OpenAiCompatibleProvider {
    /// `timeout` bounds each whole request, streamed body included.
    pub fn new(
        vendor: &'static Vendor,
        api_key: &SecretString,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Self::with_api_base(vendor, vendor.base_url, api_key, model, timeout)
    }

    /// Like [`new`](Self::new) but against another endpoint, such as a proxy.
    pub fn with_api_base(
        vendor: &'static Vendor,
        api_base: &str,
        api_key: &SecretString,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Network(format!("failed to create HTTP client: {e}")))?;
        let config = OpenAIConfig::new()
            .with_api_base(api_base)
            .with_api_key(api_key.expose_secret());

        Ok(Self {
            client: Client::with_config(config).with_http_client(http),
            vendor,
            model: model.into(),
            capabilities: vendor.capabilities(),
        })
    }

    /// Client for `provider`, or `InvalidRequest` if it doesn't speak the OpenAI protocol.
    pub fn for_provider(
        provider: ApiProvider,
        api_key: &SecretString,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let vendor = Vendor::for_provider(provider).ok_or_else(|| {
            LlmError::InvalidRequest(format!(
                "{} is not an OpenAI-compatible provider",
                provider.display_name()
            ))
        })?;
        Self::new(vendor, api_key, model, timeout)
    }

    fn warn_on_images(&self, request: &CompletionRequest) {
        let images = request.messages.iter().filter(|m| m.image.is_some()).count();
        if images > 0 {
            warn!(
                provider = self.vendor.name,
                images, "Image attachments are not sent to this provider"
            );
        }
    }
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        self.vendor.name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.warn_on_images(request);
        let body = chat_request(request, &self.model, false);

        let response = self
            .client
            .chat()
            .create(body)
            .await
            .map_err(map_openai_error)?;

        let (content, stop_reason) = match response.choices.into_iter().next() {
            Some(choice) => (
                choice.message.content.unwrap_or_default(),
                choice
                    .finish_reason
                    .as_ref()
                    .map_or(StopReason::EndTurn, map_finish_reason),
            ),
            None => (String::new(), StopReason::EndTurn),
        };

        Ok(CompletionResponse {
            id: response.id,
            content,
            model: response.model,
            stop_reason,
            usage: response
                .usage
                .map(|u| Usage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                })
                .unwrap_or_default(),
        })
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        self.warn_on_images(&request);
        let body = chat_request(&request, &self.model, true);
        let client = self.client.clone();

        Box::pin(async_stream::try_stream! {
            let chunks = client
                .chat()
                .create_stream(body)
                .await
                .map_err(map_openai_error)?;

            let mut events = map_openai_stream(chunks);
            while let Some(event) = events.next().await {
                yield event?;
            }
        })
    }
}
