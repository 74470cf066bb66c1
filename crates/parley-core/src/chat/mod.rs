//! Chat persistence port and turn orchestration.

pub mod export;
pub mod prompt;
pub mod repository;
pub mod service;
pub mod title;
pub mod turn;
