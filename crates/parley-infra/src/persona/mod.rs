//! Persona catalog sources.

pub mod http;

pub use http::HttpPersonaSource;
