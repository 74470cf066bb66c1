//! SettingsRepository trait definition.

use parley_types::error::RepositoryError;

/// Flat key/value storage for user settings.
///
/// Implementations live in parley-infra (e.g., `SqliteSettingsRepository`).
pub trait SettingsRepository: Send + Sync {
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Insert or replace a value.
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
