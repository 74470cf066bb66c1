//! LLM vendors Parley can talk to, with their model catalogs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An external LLM vendor.
///
/// Stored in settings by its lowercase identifier (`Display`/`FromStr`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    Gemini,
    #[default]
    OpenRouter,
    OpenAi,
    DeepSeek,
    Together,
    Qwen,
}

const GEMINI_MODELS: &[&str] = &[
    "gemini-1.5-pro",
    "gemini-1.5-flash",
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
];

const OPENROUTER_MODELS: &[&str] = &[
    "google/gemini-1.5-pro",
    "google/gemini-1.5-flash",
    "openai/gpt-4o",
    "openai/gpt-4o-mini",
];

const OPENAI_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-3.5-turbo"];

const DEEPSEEK_MODELS: &[&str] = &["deepseek-chat", "deepseek-reasoner"];

const TOGETHER_MODELS: &[&str] = &["meta-llama/Llama-3.3-70B-Instruct-Turbo"];

const QWEN_MODELS: &[&str] = &["qwen-plus"];

impl ApiProvider {
    /// Every provider, in the order shown to the user.
    pub const ALL: [ApiProvider; 6] = [
        ApiProvider::Gemini,
        ApiProvider::OpenRouter,
        ApiProvider::OpenAi,
        ApiProvider::Together,
        ApiProvider::Qwen,
        ApiProvider::DeepSeek,
    ];

    /// Human-readable vendor name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ApiProvider::Gemini => "Google Gemini",
            ApiProvider::OpenRouter => "OpenRouter",
            ApiProvider::OpenAi => "OpenAI",
            ApiProvider::DeepSeek => "Deepseek",
            ApiProvider::Together => "Together.ai",
            ApiProvider::Qwen => "Qwen (Alibaba)",
        }
    }

    /// Name of the secret (and environment variable) holding this vendor's API key.
    pub fn secret_key(&self) -> &'static str {
        match self {
            ApiProvider::Gemini => "GEMINI_API_KEY",
            ApiProvider::OpenRouter => "OPENROUTER_API_KEY",
            ApiProvider::OpenAi => "OPENAI_API_KEY",
            ApiProvider::DeepSeek => "DEEPSEEK_API_KEY",
            ApiProvider::Together => "TOGETHER_API_KEY",
            ApiProvider::Qwen => "QWEN_API_KEY",
        }
    }

    /// Models offered for selection. The first entry is the default.
    pub fn models(&self) -> &'static [&'static str] {
        match self {
            ApiProvider::Gemini => GEMINI_MODELS,
            ApiProvider::OpenRouter => OPENROUTER_MODELS,
            ApiProvider::OpenAi => OPENAI_MODELS,
            ApiProvider::DeepSeek => DEEPSEEK_MODELS,
            ApiProvider::Together => TOGETHER_MODELS,
            ApiProvider::Qwen => QWEN_MODELS,
        }
    }

    pub fn default_model(&self) -> &'static str {
        self.models()[0]
    }

    /// Cheap model used for generating chat titles.
    pub fn title_model(&self) -> &'static str {
        match self {
            ApiProvider::Gemini => "gemini-1.5-flash-latest",
            ApiProvider::OpenAi => "gpt-4o-mini",
            ApiProvider::OpenRouter => "google/gemini-1.5-flash",
            other => other.default_model(),
        }
    }

    pub fn is_known_model(&self, model: &str) -> bool {
        self.models().contains(&model)
    }

    /// Whether image attachments can be sent with this provider and model.
    ///
    /// Only native Gemini accepts images, and not on the 1.5 generation.
    pub fn supports_images(&self, model: &str) -> bool {
        matches!(self, ApiProvider::Gemini) && !model.contains("1.5")
    }
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiProvider::Gemini => write!(f, "gemini"),
            ApiProvider::OpenRouter => write!(f, "openrouter"),
            ApiProvider::OpenAi => write!(f, "openai"),
            ApiProvider::DeepSeek => write!(f, "deepseek"),
            ApiProvider::Together => write!(f, "together"),
            ApiProvider::Qwen => write!(f, "qwen"),
        }
    }
}

impl FromStr for ApiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], "").as_str() {
            "gemini" | "google" => Ok(ApiProvider::Gemini),
            "openrouter" => Ok(ApiProvider::OpenRouter),
            "openai" => Ok(ApiProvider::OpenAi),
            "deepseek" => Ok(ApiProvider::DeepSeek),
            "together" => Ok(ApiProvider::Together),
            "qwen" => Ok(ApiProvider::Qwen),
            _ => Err(format!("invalid provider: '{s}'")),
        }
    }
}
