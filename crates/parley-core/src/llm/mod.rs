//! LLM provider abstractions for Parley.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: Object-safe wrapper for dynamic dispatch
//! - `ProviderFactory`: builds a provider for the active vendor and key

pub mod box_provider;
pub mod factory;
pub mod provider;
