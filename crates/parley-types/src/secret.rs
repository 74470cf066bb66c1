use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

/// Metadata about a stored secret (the value itself is never in this struct).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretEntry {
    /// The key name (e.g., "OPENAI_API_KEY").
    pub key: String,
    /// Where this secret is stored.
    pub source: SecretSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Storage backend for a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretSource {
    /// Encrypted rows in the local database.
    Vault,
    /// Environment variable.
    Environment,
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSource::Vault => write!(f, "vault"),
            SecretSource::Environment => write!(f, "environment"),
        }
    }
}
