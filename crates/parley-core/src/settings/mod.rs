//! Settings persistence port and the service that interprets it.

pub mod repository;
pub mod service;
