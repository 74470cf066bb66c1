//! Persona catalogs: the fetch port and the caching service.

pub mod service;
pub mod source;
