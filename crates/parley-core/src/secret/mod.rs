//! Secret storage ports and the resolution chain.

pub mod provider;
pub mod service;
