//! Encrypted API keys in the `secrets` table.

use parley_core::secret::provider::SecretProvider;
use parley_types::error::RepositoryError;
use parley_types::secret::SecretEntry;

use crate::crypto::vault::VaultCrypto;
use crate::sqlite::secret::SqliteSecretRepository;

/// Seals values with [`VaultCrypto`] on the way in and opens them on the way out.
pub struct VaultSecretProvider {
    repo: SqliteSecretRepository,
    crypto: VaultCrypto,
}

impl VaultSecretProvider {
    pub fn new(repo: SqliteSecretRepository, crypto: VaultCrypto) -> Self {
        Self { repo, crypto }
    }
}

impl SecretProvider for VaultSecretProvider {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let Some(sealed) = self.repo.get(key).await? else {
            return Ok(None);
        };
        let opened = self
            .crypto
            .decrypt(&sealed)
            .map_err(|e| RepositoryError::Query(format!("{key}: {e}")))?;
        let value = String::from_utf8(opened)
            .map_err(|_| RepositoryError::Query(format!("{key}: stored value is not UTF-8")))?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        let sealed = self
            .crypto
            .encrypt(value.as_bytes())
            .map_err(|e| RepositoryError::Query(format!("{key}: {e}")))?;
        self.repo.set(key, &sealed).await
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        self.repo.delete(key).await
    }

    async fn list(&self) -> Result<Vec<SecretEntry>, RepositoryError> {
        self.repo.list().await
    }
}
