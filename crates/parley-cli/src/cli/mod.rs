//! CLI command definitions for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing. Commands are grouped by
//! noun (`parley chats list`, `parley key set openai`).

pub mod chat;
pub mod chats;
pub mod personas;
pub mod secret;
pub mod settings;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use parley_types::chat::ExportFormat;
use parley_types::provider::ApiProvider;
use parley_types::settings::ResponseLength;

/// Chat with LLM personas from your terminal.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat.
    Chat {
        /// Persona to talk to (skips the picker).
        #[arg(long, short)]
        persona: Option<String>,

        /// Continue an existing chat by ID (or unique ID prefix).
        #[arg(long, short, conflicts_with = "persona")]
        resume: Option<String>,
    },

    /// Manage saved chats.
    Chats {
        #[command(subcommand)]
        action: ChatsCommand,
    },

    /// Browse persona catalogs.
    Personas {
        #[command(subcommand)]
        action: PersonasCommand,
    },

    /// Show or change provider, model and response length.
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },

    /// Manage provider API keys.
    Key {
        #[command(subcommand)]
        action: KeyCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ChatsCommand {
    /// List chats, newest first.
    #[command(alias = "ls")]
    List,

    /// Print a chat transcript.
    Show {
        /// Chat ID or unique prefix.
        id: String,
    },

    /// Rename a chat.
    Rename {
        /// Chat ID or unique prefix.
        id: String,

        /// New title.
        title: String,
    },

    /// Delete a chat and all of its messages.
    #[command(alias = "rm")]
    Delete {
        /// Chat ID or unique prefix.
        id: String,

        /// Skip confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },

    /// Export a chat transcript.
    Export {
        /// Chat ID or unique prefix.
        id: String,

        /// Output format: markdown or json.
        #[arg(long, short, default_value = "markdown")]
        format: ExportFormat,

        /// Write to a file instead of stdout.
        #[arg(long, short)]
        output: Option<std::path::PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum PersonasCommand {
    /// List personas from every catalog.
    #[command(alias = "ls")]
    List {
        /// Bypass the in-process catalog cache.
        #[arg(long)]
        refresh: bool,
    },

    /// Show a persona with its prompt text.
    Show {
        /// Persona ID.
        id: String,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show the active settings.
    Show,

    /// Switch provider (resets the model to the provider's default).
    Provider {
        /// gemini, openrouter, openai, deepseek, together or qwen.
        provider: ApiProvider,
    },

    /// Select a model for the active provider. Omit to reset to the default.
    Model {
        model: Option<String>,
    },

    /// Set the preferred answer length.
    Length {
        /// auto, short or long.
        length: ResponseLength,
    },

    /// List known models for a provider (default: the active one).
    Models {
        provider: Option<ApiProvider>,
    },
}

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Store an API key in the encrypted vault.
    Set {
        /// Provider whose key to set.
        provider: ApiProvider,

        /// Key value (prompted securely if omitted).
        #[arg(long)]
        value: Option<String>,
    },

    /// Remove a stored API key.
    #[command(alias = "rm")]
    Delete {
        provider: ApiProvider,
    },

    /// List configured keys with masked values.
    #[command(alias = "ls")]
    List,
}
