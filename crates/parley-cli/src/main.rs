//! Parley terminal client entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, initializes the database and services, then
//! dispatches to the matching command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{ChatsCommand, Cli, Commands, KeyCommand, PersonasCommand, SettingsCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "parley", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    match cli.command {
        Commands::Chat { persona, resume } => {
            cli::chat::loop_runner::run_chat_loop(&state, persona, resume).await?;
        }

        Commands::Chats { action } => match action {
            ChatsCommand::List => cli::chats::list_chats(&state, cli.json).await?,
            ChatsCommand::Show { id } => cli::chats::show_chat(&state, &id, cli.json).await?,
            ChatsCommand::Rename { id, title } => {
                cli::chats::rename_chat(&state, &id, &title, cli.json).await?;
            }
            ChatsCommand::Delete { id, force } => {
                cli::chats::delete_chat(&state, &id, force, cli.json).await?;
            }
            ChatsCommand::Export { id, format, output } => {
                cli::chats::export_chat(&state, &id, format, output.as_deref(), cli.quiet)
                    .await?;
            }
        },

        Commands::Personas { action } => match action {
            PersonasCommand::List { refresh } => {
                cli::personas::list_personas(&state, refresh, cli.json).await?;
            }
            PersonasCommand::Show { id } => {
                cli::personas::show_persona(&state, &id, cli.json).await?;
            }
        },

        Commands::Settings { action } => match action {
            SettingsCommand::Show => cli::settings::show_settings(&state, cli.json).await?,
            SettingsCommand::Provider { provider } => {
                cli::settings::set_provider(&state, provider, cli.json).await?;
            }
            SettingsCommand::Model { model } => {
                cli::settings::set_model(&state, model.as_deref(), cli.json).await?;
            }
            SettingsCommand::Length { length } => {
                cli::settings::set_length(&state, length, cli.json).await?;
            }
            SettingsCommand::Models { provider } => {
                cli::settings::list_models(&state, provider, cli.json).await?;
            }
        },

        Commands::Key { action } => match action {
            KeyCommand::Set { provider, value } => {
                cli::secret::set_key(&state, provider, value.as_deref(), cli.json).await?;
            }
            KeyCommand::Delete { provider } => {
                cli::secret::delete_key(&state, provider, cli.json).await?;
            }
            KeyCommand::List => cli::secret::list_keys(&state, cli.json).await?,
        },

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
