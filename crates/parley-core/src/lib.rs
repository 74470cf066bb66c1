//! Business logic and repository trait definitions for Parley.
//!
//! This crate defines the "ports" (repository, provider, and source traits)
//! that the infrastructure layer implements, plus the services that
//! orchestrate chat turns on top of them. It depends only on `parley-types`
//! -- never on `parley-infra` or any database/HTTP crate.

pub mod chat;
pub mod llm;
pub mod persona;
pub mod secret;
pub mod settings;
