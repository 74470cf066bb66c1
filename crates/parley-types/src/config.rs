//! Global configuration types for Parley.
//!
//! `GlobalConfig` represents the top-level `config.toml` in the data
//! directory. Every field has a default, so an empty or missing file works.

use serde::{Deserialize, Serialize};

use crate::persona::Persona;
use crate::provider::ApiProvider;

/// Official hosted persona catalog.
pub const OFFICIAL_PERSONA_URL: &str =
    "https://raw.githubusercontent.com/BBQQYT/CA-promt/main/pers.json";

/// Community persona catalog.
pub const CUSTOM_PERSONA_URL: &str =
    "https://raw.githubusercontent.com/BBQQYT/CA-promt/main/cus_pers.json";

/// Top-level configuration for Parley.
///
/// Loaded from `~/.parley/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Provider used until the user picks one in settings.
    #[serde(default)]
    pub default_provider: ApiProvider,

    /// Upper bound on generated tokens per turn.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature; `None` leaves it to the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// HTTP timeout for provider and catalog requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub persona: PersonaConfig,

    #[serde(default)]
    pub title: TitleConfig,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_provider: ApiProvider::default(),
            max_tokens: default_max_tokens(),
            temperature: None,
            request_timeout_secs: default_request_timeout_secs(),
            persona: PersonaConfig::default(),
            title: TitleConfig::default(),
        }
    }
}

/// Where personas come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_official_url")]
    pub official_url: String,

    #[serde(default = "default_custom_url")]
    pub custom_url: String,

    /// Personas defined inline in `config.toml` (`[[persona.local]]`).
    #[serde(default)]
    pub local: Vec<Persona>,
}

fn default_official_url() -> String {
    OFFICIAL_PERSONA_URL.to_string()
}

fn default_custom_url() -> String {
    CUSTOM_PERSONA_URL.to_string()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            official_url: default_official_url(),
            custom_url: default_custom_url(),
            local: Vec::new(),
        }
    }
}

/// Automatic chat title generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Language the title should be written in; `None` follows the conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: None,
        }
    }
}
