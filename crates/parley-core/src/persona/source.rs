//! PersonaSource trait definition.

use parley_types::error::PersonaError;
use parley_types::persona::Persona;

/// Fetches persona catalogs and prompt texts.
///
/// Implementations live in parley-infra (e.g., `HttpPersonaSource`).
pub trait PersonaSource: Send + Sync {
    /// Download a JSON catalog (an array of personas).
    fn fetch_catalog(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Persona>, PersonaError>> + Send;

    /// Download the plain-text prompt a persona points at.
    fn fetch_prompt(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<String, PersonaError>> + Send;
}
