//! LLM provider implementations.
//!
//! Contains concrete implementations of the [`LlmProvider`] trait defined in
//! `parley-core`: a native Gemini client and one OpenAI-compatible client
//! covering OpenRouter, OpenAI, DeepSeek and Together.
//!
//! [`ParleyProviderFactory`] picks the right one for the active vendor.
//!
//! [`LlmProvider`]: parley_core::llm::provider::LlmProvider

pub mod gemini;
pub mod openai_compat;

use std::time::Duration;

use secrecy::SecretString;

use parley_core::llm::box_provider::BoxLlmProvider;
use parley_core::llm::factory::ProviderFactory;
use parley_types::llm::LlmError;
use parley_types::provider::ApiProvider;

use self::gemini::GeminiProvider;
use self::openai_compat::OpenAiCompatibleProvider;

/// Create a [`BoxLlmProvider`] for a vendor, model and resolved API key.
///
/// # Errors
///
/// - [`LlmError::AuthenticationFailed`] for a blank key.
/// - [`LlmError::InvalidRequest`] for vendors without a client (Qwen).
pub fn create_provider(
    provider: ApiProvider,
    model: &str,
    api_key: &str,
    timeout: Duration,
) -> Result<BoxLlmProvider, LlmError> {
    if api_key.trim().is_empty() {
        return Err(LlmError::AuthenticationFailed);
    }

    let api_key = SecretString::from(api_key.to_string());
    let boxed = match provider {
        ApiProvider::Gemini => {
            BoxLlmProvider::new(GeminiProvider::new(api_key, model.to_string(), timeout)?)
        }
        ApiProvider::Qwen => {
            return Err(LlmError::InvalidRequest(format!(
                "Provider {} is not implemented yet.",
                provider.display_name()
            )));
        }
        other => BoxLlmProvider::new(OpenAiCompatibleProvider::for_provider(
            other, &api_key, model, timeout,
        )?),
    };

    tracing::debug!(provider = boxed.name(), model, "Created LLM provider");
    Ok(boxed)
}

/// [`ProviderFactory`] backed by the concrete clients in this module.
#[derive(Debug, Clone)]
pub struct ParleyProviderFactory {
    request_timeout: Duration,
}

impl ParleyProviderFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for ParleyProviderFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

impl ProviderFactory for ParleyProviderFactory {
    fn create(
        &self,
        provider: ApiProvider,
        model: &str,
        api_key: &str,
    ) -> Result<BoxLlmProvider, LlmError> {
        create_provider(provider, model, api_key, self.request_timeout)
    }
}
