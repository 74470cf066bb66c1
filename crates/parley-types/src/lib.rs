//! Shared domain types for Parley.
//!
//! This crate contains the domain types used across the Parley chat client:
//! chats and messages, LLM request/stream shapes, providers and their model
//! catalogs, personas, settings, and the associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod persona;
pub mod provider;
pub mod secret;
pub mod settings;
