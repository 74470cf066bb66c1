//! Chat management CLI commands: list, show, rename, delete, export.

use std::path::Path;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use uuid::Uuid;

use parley_types::chat::{ChatMessage, ChatSummary, ExportFormat, Sender};

use crate::state::AppState;

use super::chat::renderer::ChatRenderer;

/// Resolve a full chat ID or a unique prefix of one.
pub async fn resolve_chat_id(state: &AppState, input: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(input) {
        return Ok(id);
    }
    let chats = state.chat_service.list_chats().await?;
    match_chat_prefix(&chats, input)
}

fn match_chat_prefix(chats: &[ChatSummary], prefix: &str) -> Result<Uuid> {
    let prefix = prefix.trim().to_lowercase();
    if prefix.is_empty() {
        bail!("Chat ID must not be empty");
    }

    let mut matches = chats
        .iter()
        .filter(|summary| summary.chat.id.to_string().starts_with(&prefix));

    match (matches.next(), matches.next()) {
        (Some(summary), None) => Ok(summary.chat.id),
        (None, _) => bail!("Chat '{prefix}' not found"),
        (Some(_), Some(_)) => bail!("Chat ID prefix '{prefix}' is ambiguous"),
    }
}

/// Short form of a chat ID for tables and banners.
pub fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// List chats with title, persona, message count and creation date.
pub async fn list_chats(state: &AppState, json: bool) -> Result<()> {
    let chats = state.chat_service.list_chats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chats)?);
        return Ok(());
    }

    if chats.is_empty() {
        println!();
        println!(
            "  {} No chats yet. Start one with: {}",
            style("i").blue().bold(),
            style("parley chat").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Persona").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);

    for summary in &chats {
        let chat = &summary.chat;
        table.add_row(vec![
            Cell::new(short_id(&chat.id)).fg(Color::DarkGrey),
            Cell::new(truncate(&chat.title, 40)).fg(Color::Cyan),
            Cell::new(state.persona_service.display_name(&chat.persona_id).await),
            Cell::new(summary.message_count),
            Cell::new(chat.created_at.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} chat{}",
        style(chats.len()).bold(),
        if chats.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Print a chat transcript.
pub async fn show_chat(state: &AppState, id: &str, json: bool) -> Result<()> {
    let chat_id = resolve_chat_id(state, id).await?;
    let chat = state.chat_service.get_chat(&chat_id).await?;
    let messages = state.chat_service.history(&chat_id).await?;

    if json {
        let value = serde_json::json!({ "chat": chat, "messages": messages });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let persona_name = state.persona_service.display_name(&chat.persona_id).await;
    let renderer = ChatRenderer::new();

    println!();
    println!("  {}", style(&chat.title).cyan().bold());
    println!(
        "  {}",
        style(format!(
            "{} \u{00b7} {} \u{00b7} {}",
            persona_name,
            chat.created_at.format("%Y-%m-%d %H:%M"),
            short_id(&chat.id)
        ))
        .dim()
    );
    println!();
    print_transcript(&renderer, &messages, &persona_name);

    Ok(())
}

/// Print numbered messages. Numbers match the `/edit N` and `/delete N` commands.
pub fn print_transcript(renderer: &ChatRenderer, messages: &[ChatMessage], persona_name: &str) {
    if messages.is_empty() {
        println!("  {}", style("(no messages)").dim());
        println!();
        return;
    }

    for (i, msg) in messages.iter().enumerate() {
        let number = style(format!("{:>3}.", i + 1)).dim();
        match msg.sender {
            Sender::User => {
                println!("{number} {}", style("You").green().bold());
                if let Some(path) = &msg.image_path {
                    println!("      {}", style(format!("[image: {path}]")).dim());
                }
                for line in msg.text.lines() {
                    println!("      {line}");
                }
            }
            Sender::Model if msg.is_error => {
                println!("{number} {}", style(persona_name).cyan().bold());
                println!("      {}", style(&msg.text).red());
            }
            Sender::Model => {
                println!("{number} {}", style(persona_name).cyan().bold());
                print!("{}", indent(&renderer.render_final(&msg.text), "      "));
            }
        }
        println!();
    }
}

/// Rename a chat.
pub async fn rename_chat(state: &AppState, id: &str, title: &str, json: bool) -> Result<()> {
    let chat_id = resolve_chat_id(state, id).await?;
    let renamed = state.chat_service.rename_chat(&chat_id, title).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"renamed": renamed, "id": chat_id, "title": title.trim()})
        );
    } else if renamed {
        println!(
            "  {} Chat renamed to '{}'",
            style("✓").green().bold(),
            style(title.trim()).bold()
        );
    } else {
        println!("  {} Title must not be blank", style("!").yellow().bold());
    }

    Ok(())
}

/// Delete a chat after confirmation (skipped with `--force` or `--json`).
pub async fn delete_chat(state: &AppState, id: &str, force: bool, json: bool) -> Result<()> {
    let chat_id = resolve_chat_id(state, id).await?;
    let chat = state.chat_service.get_chat(&chat_id).await?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Permanently delete chat '{}' and all its messages?",
                style(&chat.title).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state.chat_service.delete_chat(&chat_id).await?;

    if json {
        println!("{}", serde_json::json!({"deleted": true, "id": chat_id}));
    } else {
        println!(
            "  {} Chat '{}' deleted",
            style("✓").green().bold(),
            style(&chat.title).bold()
        );
    }

    Ok(())
}

/// Export a chat as Markdown or JSON, to stdout or a file.
pub async fn export_chat(
    state: &AppState,
    id: &str,
    format: ExportFormat,
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let chat_id = resolve_chat_id(state, id).await?;
    let rendered = state.chat_service.export(&chat_id, format).await?;

    match output {
        Some(path) => {
            tokio::fs::write(path, &rendered)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !quiet {
                println!(
                    "  {} Exported {} to {}",
                    style("✓").green().bold(),
                    format,
                    style(path.display()).cyan()
                );
            }
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn indent(text: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        out.push_str(prefix);
        out.push_str(line);
        out.push('\n');
    }
    out
}
