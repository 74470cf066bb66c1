//! API keys read from the process environment.
//!
//! `GEMINI_API_KEY=... parley chat` takes precedence over a key saved with
//! `parley key set`, and nothing here ever writes or unsets a variable.

use parley_core::secret::provider::SecretProvider;
use parley_types::error::RepositoryError;
use parley_types::provider::ApiProvider;
use parley_types::secret::{SecretEntry, SecretSource};

pub struct EnvSecretProvider {
    /// Variable names reported by `list()`.
    known_keys: Vec<String>,
}

impl EnvSecretProvider {
    /// Lists the key variables of every supported provider.
    pub fn new() -> Self {
        Self::with_known_keys(ApiProvider::ALL.iter().map(|p| p.secret_key().to_string()))
    }

    pub fn with_known_keys(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            known_keys: keys.into_iter().collect(),
        }
    }
}

impl Default for EnvSecretProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn read_only(key: &str) -> RepositoryError {
    RepositoryError::Query(format!("{key} comes from the environment and cannot be changed here"))
}

impl SecretProvider for EnvSecretProvider {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        // Unset and non-Unicode look the same
        Ok(std::env::var(key).ok())
    }

    async fn set(&self, key: &str, _value: &str) -> Result<(), RepositoryError> {
        Err(read_only(key))
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        Err(read_only(key))
    }

    async fn list(&self) -> Result<Vec<SecretEntry>, RepositoryError> {
        let present = |key: &&String| {
            std::env::var(key.as_str()).is_ok_and(|value| !value.trim().is_empty())
        };
        Ok(self
            .known_keys
            .iter()
            .filter(present)
            .map(|key| SecretEntry {
                key: key.clone(),
                source: SecretSource::Environment,
                updated_at: None,
            })
            .collect())
    }
}
