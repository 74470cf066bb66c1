//! Persona types.
//!
//! A persona is a named system-prompt template. The hosted catalogs list
//! personas with a `prompt_url`; the prompt text itself is fetched lazily.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A persona as listed in a catalog.
///
/// Field names match the hosted JSON catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prompt_url: String,
    /// Prompt text, filled in once fetched (or given inline for local personas).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Which catalog a persona came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaOrigin {
    Official,
    Custom,
    Local,
}

impl PersonaOrigin {
    pub const ALL: [PersonaOrigin; 3] = [
        PersonaOrigin::Official,
        PersonaOrigin::Custom,
        PersonaOrigin::Local,
    ];
}

impl fmt::Display for PersonaOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersonaOrigin::Official => write!(f, "official"),
            PersonaOrigin::Custom => write!(f, "custom"),
            PersonaOrigin::Local => write!(f, "local"),
        }
    }
}

impl FromStr for PersonaOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "official" => Ok(PersonaOrigin::Official),
            "custom" => Ok(PersonaOrigin::Custom),
            "local" => Ok(PersonaOrigin::Local),
            other => Err(format!("invalid persona origin: '{other}'")),
        }
    }
}

/// A persona paired with the catalog it was found in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPersona {
    pub origin: PersonaOrigin,
    #[serde(flatten)]
    pub persona: Persona,
}
