//! The contract every LLM backend implements.

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;

use parley_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StreamEvent,
};

/// Boxed, owned event stream of a streaming completion.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// An LLM backend (native Gemini, or an OpenAI-compatible vendor).
///
/// `complete` uses RPITIT; `stream` returns a boxed `'static` stream so it
/// can outlive the borrow of `self` and cross the [`BoxLlmProvider`] seam.
///
/// [`BoxLlmProvider`]: super::box_provider::BoxLlmProvider
pub trait LlmProvider: Send + Sync {
    /// Short vendor id, e.g. "gemini" or "openrouter".
    fn name(&self) -> &str;

    fn capabilities(&self) -> &ProviderCapabilities;

    /// One-shot completion; used for chat titles.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Streaming completion; used for chat turns.
    fn stream(&self, request: CompletionRequest) -> EventStream;
}
