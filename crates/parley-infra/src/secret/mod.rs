//! Concrete secret stores and the chain that orders them.

pub mod chain;
pub mod env;
pub mod vault;

pub use vault::VaultSecretProvider;
