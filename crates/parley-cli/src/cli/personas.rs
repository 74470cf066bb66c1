//! Persona CLI commands: list, show.

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use parley_types::persona::PersonaOrigin;

use crate::state::AppState;

/// List personas from every catalog.
pub async fn list_personas(state: &AppState, refresh: bool, json: bool) -> Result<()> {
    if refresh {
        state.persona_service.refresh().await;
    }
    let personas = state.persona_service.list_all().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&personas)?);
        return Ok(());
    }

    if personas.is_empty() {
        println!();
        println!(
            "  {} No personas available. Check your connection and try: {}",
            style("!").yellow().bold(),
            style("parley personas list --refresh").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Catalog").fg(Color::White),
        Cell::new("Description").fg(Color::White),
    ]);

    for entry in &personas {
        let origin_color = match entry.origin {
            PersonaOrigin::Official => Color::Green,
            PersonaOrigin::Custom => Color::Yellow,
            PersonaOrigin::Local => Color::Magenta,
        };
        table.add_row(vec![
            Cell::new(&entry.persona.id).fg(Color::DarkGrey),
            Cell::new(&entry.persona.name).fg(Color::Cyan),
            Cell::new(entry.origin.to_string()).fg(origin_color),
            Cell::new(&entry.persona.description),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} persona{}",
        style(personas.len()).bold(),
        if personas.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Show a persona along with its prompt text.
pub async fn show_persona(state: &AppState, id: &str, json: bool) -> Result<()> {
    let Some(persona) = state.persona_service.get_persona(id).await? else {
        bail!("Persona '{id}' not found");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&persona)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(&persona.name).cyan().bold());
    if !persona.description.is_empty() {
        println!("  {}", style(&persona.description).dim());
    }
    println!();
    println!("  {}  {}", style("ID:").bold(), persona.id);
    if !persona.prompt_url.is_empty() {
        println!("  {} {}", style("URL:").bold(), style(&persona.prompt_url).dim());
    }
    println!();

    match persona.prompt.as_deref() {
        Some(prompt) if !prompt.trim().is_empty() => {
            for line in prompt.lines() {
                println!("  {line}");
            }
        }
        _ => println!("  {}", style("(no prompt)").dim()),
    }
    println!();

    Ok(())
}
