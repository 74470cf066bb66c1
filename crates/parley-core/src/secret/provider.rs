//! Secret provider trait definition.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parley_types::error::RepositoryError;
use parley_types::secret::SecretEntry;

/// Trait for secret storage backends (vault, environment).
///
/// Each provider stores and retrieves secret values. `SecretService`
/// chains multiple providers in priority order.
pub trait SecretProvider: Send + Sync {
    /// Retrieve a secret value by key.
    /// Returns None if the secret does not exist in this provider.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Store a secret value.
    fn set(&self, key: &str, value: &str)
    -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a secret.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// List all secret entries (metadata only, no values).
    fn list(&self) -> impl Future<Output = Result<Vec<SecretEntry>, RepositoryError>> + Send;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`SecretProvider`] with boxed futures.
pub trait SecretProviderDyn: Send + Sync {
    fn get_boxed<'a>(&'a self, key: &'a str)
    -> BoxFuture<'a, Result<Option<String>, RepositoryError>>;

    fn set_boxed<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> BoxFuture<'a, Result<(), RepositoryError>>;

    fn delete_boxed<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), RepositoryError>>;

    fn list_boxed(&self) -> BoxFuture<'_, Result<Vec<SecretEntry>, RepositoryError>>;
}

impl<T: SecretProvider> SecretProviderDyn for T {
    fn get_boxed<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, RepositoryError>> {
        Box::pin(self.get(key))
    }

    fn set_boxed<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> BoxFuture<'a, Result<(), RepositoryError>> {
        Box::pin(self.set(key, value))
    }

    fn delete_boxed<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), RepositoryError>> {
        Box::pin(self.delete(key))
    }

    fn list_boxed(&self) -> BoxFuture<'_, Result<Vec<SecretEntry>, RepositoryError>> {
        Box::pin(self.list())
    }
}

/// Shared, type-erased secret provider used in the resolution chain.
pub type DynSecretProvider = Arc<dyn SecretProviderDyn>;
