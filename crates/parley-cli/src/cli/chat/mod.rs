//! Interactive terminal chat.
//!
//! Streams model answers as they arrive, renders finished answers as
//! markdown, and offers slash commands for editing and forking the
//! conversation. Entry point: `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;
