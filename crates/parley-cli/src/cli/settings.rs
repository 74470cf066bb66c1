//! Settings CLI commands: show, provider, model, length, models.

use anyhow::Result;
use console::style;

use parley_types::provider::ApiProvider;
use parley_types::settings::{ChatSettings, ResponseLength};

use crate::state::AppState;

/// Show the active settings.
pub async fn show_settings(state: &AppState, json: bool) -> Result<()> {
    let settings = state.settings_service.load().await?;
    let has_key = state
        .secret_service
        .api_key(settings.provider)
        .await?
        .is_some();

    if json {
        let value = serde_json::json!({
            "provider": settings.provider,
            "model": settings.effective_model(),
            "response_length": settings.response_length,
            "api_key_configured": has_key,
            "supports_images": settings.supports_images(),
            "max_tokens": state.config.max_tokens,
            "data_dir": state.data_dir,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let key_status = if has_key {
        style("configured".to_string()).green()
    } else {
        style(format!("missing (parley key set {})", settings.provider)).red()
    };

    println!();
    println!(
        "  {}  {} ({})",
        style("Provider:").bold(),
        settings.provider.display_name(),
        style(settings.provider).dim()
    );
    println!("  {}     {}", style("Model:").bold(), settings.effective_model());
    println!("  {}    {}", style("Length:").bold(), settings.response_length);
    println!("  {}   {}", style("API key:").bold(), key_status);
    println!(
        "  {}    {}",
        style("Images:").bold(),
        if settings.supports_images() { "yes" } else { "no" }
    );
    println!("  {}  {}", style("Max tokens:").bold(), state.config.max_tokens);
    println!(
        "  {}  {}",
        style("Data dir:").bold(),
        style(state.data_dir.display()).dim()
    );
    println!();

    Ok(())
}

/// Switch the active provider.
pub async fn set_provider(state: &AppState, provider: ApiProvider, json: bool) -> Result<()> {
    let settings = state.settings_service.set_provider(provider).await?;
    print_updated(&settings, json, "Provider")
}

/// Select a model, or reset to the provider default when `model` is `None`.
pub async fn set_model(state: &AppState, model: Option<&str>, json: bool) -> Result<()> {
    let current = state.settings_service.load().await?;
    let requested = model.map(str::trim).unwrap_or_default();
    if !json && !requested.is_empty() && !current.provider.is_known_model(requested) {
        println!(
            "  {} '{}' is not a known {} model; using it anyway.",
            style("!").yellow().bold(),
            requested,
            current.provider.display_name()
        );
    }

    let settings = state.settings_service.set_model(requested).await?;
    print_updated(&settings, json, "Model")
}

pub async fn set_length(state: &AppState, length: ResponseLength, json: bool) -> Result<()> {
    let settings = state.settings_service.set_response_length(length).await?;
    print_updated(&settings, json, "Response length")
}

/// List known models for a provider, marking the active one.
pub async fn list_models(
    state: &AppState,
    provider: Option<ApiProvider>,
    json: bool,
) -> Result<()> {
    let settings = state.settings_service.load().await?;
    let provider = provider.unwrap_or(settings.provider);
    let active = (provider == settings.provider).then(|| settings.effective_model());

    if json {
        let models: Vec<_> = provider
            .models()
            .iter()
            .map(|m| {
                serde_json::json!({
                    "model": m,
                    "active": active == Some(*m),
                    "images": provider.supports_images(m),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "provider": provider,
                "models": models,
            }))?
        );
        return Ok(());
    }

    println!();
    println!("  {}", style(provider.display_name()).bold());
    for model in provider.models() {
        let marker = if active == Some(*model) {
            style("*").green().bold()
        } else {
            style(" ")
        };
        let images = if provider.supports_images(model) {
            style(" (images)").dim().to_string()
        } else {
            String::new()
        };
        println!("  {marker} {model}{images}");
    }
    println!();

    Ok(())
}

fn print_updated(settings: &ChatSettings, json: bool, what: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(settings)?);
    } else {
        println!(
            "  {} {what} updated: {} \u{00b7} {} \u{00b7} {}",
            style("✓").green().bold(),
            settings.provider.display_name(),
            style(settings.effective_model()).cyan(),
            settings.response_length
        );
    }
    Ok(())
}
