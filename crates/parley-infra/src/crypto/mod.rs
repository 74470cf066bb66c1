//! Cryptographic operations for Parley.
//!
//! - `vault`: AES-256-GCM encryption for API keys at rest

pub mod vault;
