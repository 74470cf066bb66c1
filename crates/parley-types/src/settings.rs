//! User-adjustable chat settings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::provider::ApiProvider;

/// How long the model's answers should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseLength {
    #[default]
    Auto,
    Short,
    Long,
}

impl ResponseLength {
    /// Suffix appended to the persona prompt to steer answer length.
    pub fn instruction(&self) -> &'static str {
        match self {
            ResponseLength::Auto => {
                "\n\nAdapt the length of your answer to the user's messages. \
                 If the user's message is short, answer briefly. \
                 If it is long, answer in detail."
            }
            ResponseLength::Short => "\n\nKeep your answers short and concise.",
            ResponseLength::Long => {
                "\n\nMake your answers as long, detailed and thorough as possible."
            }
        }
    }
}

impl fmt::Display for ResponseLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseLength::Auto => write!(f, "auto"),
            ResponseLength::Short => write!(f, "short"),
            ResponseLength::Long => write!(f, "long"),
        }
    }
}

impl FromStr for ResponseLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ResponseLength::Auto),
            "short" => Ok(ResponseLength::Short),
            "long" => Ok(ResponseLength::Long),
            other => Err(format!("invalid response length: '{other}'")),
        }
    }
}

/// The settings a chat turn is resolved against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub provider: ApiProvider,
    /// Selected model; `None` means the provider's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub response_length: ResponseLength,
}

impl ChatSettings {
    /// The model a turn will actually use.
    pub fn effective_model(&self) -> &str {
        match self.model.as_deref() {
            Some(m) if !m.trim().is_empty() => m,
            _ => self.provider.default_model(),
        }
    }

    pub fn supports_images(&self) -> bool {
        self.provider.supports_images(self.effective_model())
    }
}
