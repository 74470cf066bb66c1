//! ProviderFactory -- turns the active settings into a live provider.

use parley_types::llm::LlmError;
use parley_types::provider::ApiProvider;

use super::box_provider::BoxLlmProvider;

/// Builds an LLM provider client for a vendor, model, and API key.
///
/// The chat service resolves the key itself and asks the factory for a
/// fresh client on every turn, so key or provider changes apply immediately.
pub trait ProviderFactory: Send + Sync {
    fn create(
        &self,
        provider: ApiProvider,
        model: &str,
        api_key: &str,
    ) -> Result<BoxLlmProvider, LlmError>;
}
