//! Infrastructure layer for Parley.
//!
//! Contains implementations of the ports defined in `parley-core`: SQLite
//! storage, the AES-256-GCM secret vault, LLM provider clients (Gemini and
//! OpenAI-compatible vendors), the HTTP persona catalog, and config loading.

pub mod config;
pub mod crypto;
pub mod llm;
pub mod persona;
pub mod secret;
pub mod sqlite;
