//! Type-erased [`LlmProvider`].
//!
//! RPITIT traits are not dyn-compatible, so a private mirror trait with a
//! boxed `complete` future is blanket-implemented for every provider and
//! stored behind `Box<dyn _>`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities};

use super::provider::{EventStream, LlmProvider};

type CompleteFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;

trait ErasedProvider: Send + Sync {
    fn name(&self) -> &str;
    fn capabilities(&self) -> &ProviderCapabilities;
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompleteFuture<'a>;
    fn stream(&self, request: CompletionRequest) -> EventStream;
}

impl<P: LlmProvider> ErasedProvider for P {
    fn name(&self) -> &str {
        LlmProvider::name(self)
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        LlmProvider::capabilities(self)
    }

    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompleteFuture<'a> {
        Box::pin(LlmProvider::complete(self, request))
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        LlmProvider::stream(self, request)
    }
}

/// A provider chosen at runtime from the user's settings.
pub struct BoxLlmProvider {
    inner: Box<dyn ErasedProvider>,
}

impl BoxLlmProvider {
    pub fn new<P: LlmProvider + 'static>(provider: P) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn capabilities(&self) -> &ProviderCapabilities {
        self.inner.capabilities()
    }

    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.inner.complete(request).await
    }

    pub fn stream(&self, request: CompletionRequest) -> EventStream {
        self.inner.stream(request)
    }
}

impl fmt::Debug for BoxLlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoxLlmProvider").field(&self.name()).finish()
    }
}
