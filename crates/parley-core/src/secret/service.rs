//! API key lookup across the configured secret stores.
//!
//! Stores are consulted in order, so an environment variable shadows a key
//! saved in the vault. Writes go to the first store that accepts them.

use std::collections::HashSet;

use parley_types::error::RepositoryError;
use parley_types::provider::ApiProvider;
use parley_types::secret::SecretEntry;

use super::provider::DynSecretProvider;

pub struct SecretService {
    chain: Vec<DynSecretProvider>,
}

impl SecretService {
    pub fn new(chain: Vec<DynSecretProvider>) -> Self {
        Self { chain }
    }

    /// First value found for `key`, in chain order.
    pub async fn get_secret(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        for store in &self.chain {
            let found = store.get_boxed(key).await?;
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// API key for `provider`. A blank value is treated as unset.
    pub async fn api_key(&self, provider: ApiProvider) -> Result<Option<String>, RepositoryError> {
        let key = self.get_secret(provider.secret_key()).await?;
        Ok(key.filter(|k| !k.trim().is_empty()))
    }

    /// Save `value` in the first store that accepts writes.
    pub async fn set_secret(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        let mut last_error = None;
        for store in &self.chain {
            match store.set_boxed(key, value).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = Some(e),
            }
        }
        tracing::debug!(key, error = ?last_error, "No secret store accepted the write");
        Err(RepositoryError::Query(format!("cannot store {key}: no writable secret store")))
    }

    /// Remove `key` from every store holding it. `NotFound` when none did.
    pub async fn delete_secret(&self, key: &str) -> Result<(), RepositoryError> {
        let mut removed = 0usize;
        for store in &self.chain {
            if store.delete_boxed(key).await.is_ok() {
                removed += 1;
            }
        }
        if removed == 0 {
            Err(RepositoryError::NotFound)
        } else {
            Ok(())
        }
    }

    /// Entries from all stores; a key shadowed by an earlier store is listed once.
    /// A store that fails to list is skipped.
    pub async fn list_secrets(&self) -> Result<Vec<SecretEntry>, RepositoryError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for store in &self.chain {
            match store.list_boxed().await {
                Ok(entries) => out.extend(
                    entries
                        .into_iter()
                        .filter(|entry| seen.insert(entry.key.clone())),
                ),
                Err(e) => tracing::warn!(error = %e, "Skipping secret store that failed to list"),
            }
        }

        Ok(out)
    }

    /// `****` followed by the last four characters; short values are fully hidden.
    pub fn mask_secret(value: &str) -> String {
        let count = value.chars().count();
        if count <= 4 {
            return "****".to_string();
        }
        let tail: String = value.chars().skip(count - 4).collect();
        format!("****{tail}")
    }
}
