//! API key CLI commands: set, delete, list.

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Password;

use parley_core::secret::service::SecretService;
use parley_types::error::RepositoryError;
use parley_types::provider::ApiProvider;

use crate::state::AppState;

/// Store a provider API key, prompting with hidden input when no value is given.
///
/// # Examples
///
/// ```bash
/// # Secure prompt (recommended)
/// parley key set gemini
///
/// # Script/automation mode
/// parley key set openai --value sk-...
/// ```
pub async fn set_key(
    state: &AppState,
    provider: ApiProvider,
    value: Option<&str>,
    json: bool,
) -> Result<()> {
    let key = provider.secret_key();
    let secret_value = match value {
        Some(v) => v.to_string(),
        None => Password::new()
            .with_prompt(format!(
                "Enter {} API key",
                style(provider.display_name()).bold()
            ))
            .interact()?,
    };

    if secret_value.trim().is_empty() {
        bail!("API key must not be empty");
    }

    state
        .secret_service
        .set_secret(key, secret_value.trim())
        .await?;

    let masked = SecretService::mask_secret(secret_value.trim());
    if json {
        println!(
            "{}",
            serde_json::json!({"set": true, "key": key, "masked": masked})
        );
    } else {
        println!(
            "  {} {} key saved as {} ({})",
            style("✓").green().bold(),
            provider.display_name(),
            style(key).bold(),
            masked
        );
    }

    Ok(())
}

/// Remove a stored provider key.
pub async fn delete_key(state: &AppState, provider: ApiProvider, json: bool) -> Result<()> {
    let key = provider.secret_key();
    let deleted = match state.secret_service.delete_secret(key).await {
        Ok(()) => true,
        Err(RepositoryError::NotFound) => false,
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::json!({"deleted": deleted, "key": key}));
    } else if deleted {
        println!(
            "  {} {} deleted",
            style("✓").green().bold(),
            style(key).bold()
        );
    } else {
        println!(
            "  {} No stored key named {}",
            style("i").blue().bold(),
            style(key).bold()
        );
    }

    Ok(())
}

/// List configured keys with masked values.
pub async fn list_keys(state: &AppState, json: bool) -> Result<()> {
    let entries = state.secret_service.list_secrets().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!();
        println!(
            "  {} No API keys configured. Add one with: {}",
            style("i").blue().bold(),
            style("parley key set gemini").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Key").fg(Color::White),
        Cell::new("Provider").fg(Color::White),
        Cell::new("Source").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);

    for entry in &entries {
        let masked = match state.secret_service.get_secret(&entry.key).await {
            Ok(Some(val)) => SecretService::mask_secret(&val),
            _ => "****".to_string(),
        };
        let provider = ApiProvider::ALL
            .iter()
            .find(|p| p.secret_key() == entry.key)
            .map(|p| p.display_name())
            .unwrap_or("-");
        let updated = entry
            .updated_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(format!("{}: {}", entry.key, masked)).fg(Color::Cyan),
            Cell::new(provider),
            Cell::new(entry.source.to_string()),
            Cell::new(updated).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} key{}",
        style(entries.len()).bold(),
        if entries.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}
