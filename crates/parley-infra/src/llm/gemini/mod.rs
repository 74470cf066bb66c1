//! Google Gemini LLM provider implementation.
//!
//! Native REST client with SSE streaming and inline image attachments.

pub mod client;
pub mod streaming;
pub mod types;

pub use client::GeminiProvider;
