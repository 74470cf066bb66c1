//! Endpoints and limits of the vendors that speak the OpenAI chat protocol.

use parley_types::llm::ProviderCapabilities;
use parley_types::provider::ApiProvider;

/// A vendor reachable through the OpenAI chat completions API.
#[derive(Debug, PartialEq, Eq)]
pub struct Vendor {
    /// Name reported by `LlmProvider::name`.
    pub name: &'static str,
    /// API root without a trailing slash.
    pub base_url: &'static str,
    pub max_context_tokens: u32,
    pub max_output_tokens: u32,
}

pub const OPENROUTER: Vendor = Vendor {
    name: "openrouter",
    base_url: "https://openrouter.ai/api/v1",
    max_context_tokens: 128_000,
    max_output_tokens: 16_384,
};

pub const OPENAI: Vendor = Vendor {
    name: "openai",
    base_url: "https://api.openai.com/v1",
    max_context_tokens: 128_000,
    max_output_tokens: 16_384,
};

pub const DEEPSEEK: Vendor = Vendor {
    name: "deepseek",
    base_url: "https://api.deepseek.com/v1",
    max_context_tokens: 64_000,
    max_output_tokens: 8_192,
};

pub const TOGETHER: Vendor = Vendor {
    name: "together",
    base_url: "https://api.together.xyz/v1",
    max_context_tokens: 131_072,
    max_output_tokens: 8_192,
};

impl Vendor {
    /// The OpenAI-compatible vendor behind `provider`, if it is one.
    pub fn for_provider(provider: ApiProvider) -> Option<&'static Vendor> {
        match provider {
            ApiProvider::OpenRouter => Some(&OPENROUTER),
            ApiProvider::OpenAi => Some(&OPENAI),
            ApiProvider::DeepSeek => Some(&DEEPSEEK),
            ApiProvider::Together => Some(&TOGETHER),
            ApiProvider::Gemini | ApiProvider::Qwen => None,
        }
    }

    /// Text-only streaming capabilities.
    pub fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: true,
            vision: false,
            max_context_tokens: self.max_context_tokens,
            max_output_tokens: self.max_output_tokens,
        }
    }
}
