//! SQLite secret storage.
//!
//! Stores already-encrypted secret values as BLOBs. Encryption and
//! decryption happen in `VaultSecretProvider`; this repository only moves
//! raw bytes and never logs them.

use chrono::Utc;
use parley_types::error::RepositoryError;
use parley_types::secret::{SecretEntry, SecretSource};

use super::pool::DatabasePool;
use super::{from_millis, query_error, require_match, to_millis};

/// SQLite-backed storage for encrypted secret values.
pub struct SqliteSecretRepository {
    pool: DatabasePool,
}

impl SqliteSecretRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Encrypted bytes stored under `key`.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        sqlx::query_scalar("SELECT encrypted_value FROM secrets WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)
    }

    /// Insert or replace the encrypted bytes for `key`.
    pub async fn set(&self, key: &str, encrypted: &[u8]) -> Result<(), RepositoryError> {
        let now = to_millis(&Utc::now());

        sqlx::query(
            "INSERT INTO secrets (key, encrypted_value, created_at, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET encrypted_value = excluded.encrypted_value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(encrypted)
        .bind(now)
        .bind(now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM secrets WHERE key = ?")
            .bind(key)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        require_match(result)
    }

    /// Key metadata for every stored secret, ordered by key.
    pub async fn list(&self) -> Result<Vec<SecretEntry>, RepositoryError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT key, updated_at FROM secrets ORDER BY key")
                .fetch_all(&self.pool.reader)
                .await
                .map_err(query_error)?;

        rows.into_iter()
            .map(|(key, updated_at)| {
                Ok(SecretEntry {
                    key,
                    source: SecretSource::Vault,
                    updated_at: Some(from_millis(updated_at)?),
                })
            })
            .collect()
    }
}
