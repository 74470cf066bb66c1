//! Main chat loop orchestration.
//!
//! Coordinates the conversation lifecycle: chat resolution (new or
//! resumed), welcome banner, the input loop with slash commands, and
//! streaming model turns that can be stopped with Ctrl+C.

use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use console::style;
use dialoguer::Select;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use parley_core::chat::turn::{TurnEvent, TurnOutcome};
use parley_types::chat::ChatMessage;
use parley_types::llm::ImageAttachment;

use crate::cli::chats::{print_transcript, resolve_chat_id};
use crate::state::AppState;

use super::banner::print_welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer::ChatRenderer;

/// Persona used when no catalog could be loaded.
const FALLBACK_PERSONA_ID: &str = "assistant";

/// Which service call starts a turn.
#[derive(Debug, Clone, Copy)]
enum TurnKind {
    Send,
    Retry,
}

/// Run the interactive chat loop, either in a new chat or a resumed one.
pub async fn run_chat_loop(
    state: &AppState,
    persona: Option<String>,
    resume: Option<String>,
) -> anyhow::Result<()> {
    let renderer = ChatRenderer::new();

    let chat = match resume {
        Some(id) => {
            let chat_id = resolve_chat_id(state, &id).await?;
            state.chat_service.get_chat(&chat_id).await?
        }
        None => {
            let persona_id = pick_persona(state, persona).await?;
            state.chat_service.create_chat(&persona_id).await?
        }
    };
    let chat_id = chat.id;

    let persona_name = state.persona_service.display_name(&chat.persona_id).await;
    let description = state
        .persona_service
        .get_persona(&chat.persona_id)
        .await
        .ok()
        .flatten()
        .map(|p| p.description)
        .unwrap_or_default();

    let settings = state.settings_service.load().await?;
    print_welcome_banner(
        &persona_name,
        &description,
        &chat.title,
        settings.provider.display_name(),
        settings.effective_model(),
        &chat_id.to_string(),
    );

    if state.secret_service.api_key(settings.provider).await?.is_none() {
        println!(
            "  {} No API key for {}. Set one with: {}",
            style("!").yellow().bold(),
            settings.provider.display_name(),
            style(format!("parley key set {}", settings.provider)).yellow()
        );
        println!();
    }

    let history = state.chat_service.history(&chat_id).await?;
    if !history.is_empty() {
        print_transcript(&renderer, &history, &persona_name);
    }

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut input, _writer) = ChatInput::new(prompt)
        .map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    let mut pending_image: Option<String> = None;
    let mut typed_ahead = TypeAhead::default();

    loop {
        let event = match typed_ahead.pop() {
            Some(text) => {
                println!("  {} {text}", style("You >").green().bold());
                InputEvent::Message(text)
            }
            None => input.read_line().await,
        };
        let text = match event {
            InputEvent::Eof => {
                println!("\n  {}", style("Chat saved.").dim());
                break;
            }
            InputEvent::Interrupted => {
                println!(
                    "\n  {}",
                    style("Press Ctrl+D to exit, or keep chatting.").dim()
                );
                continue;
            }
            InputEvent::Message(text) if text.is_empty() => continue,
            InputEvent::Message(text) => text,
        };

        if let Some(cmd) = commands::parse(&text) {
            match cmd {
                ChatCommand::Help => commands::print_help(),
                ChatCommand::Clear => input.clear(),
                ChatCommand::Exit => {
                    println!("\n  {}", style("Chat saved.").dim());
                    break;
                }
                ChatCommand::History => {
                    let messages = state.chat_service.history(&chat_id).await?;
                    println!();
                    print_transcript(&renderer, &messages, &persona_name);
                }
                ChatCommand::Edit { number, text } => {
                    let messages = state.chat_service.history(&chat_id).await?;
                    let Some(target) = message_at(&messages, number) else {
                        print_warning(&format!("There is no message {number}."));
                        continue;
                    };
                    if state.chat_service.edit_and_fork(&target.id, &text).await? {
                        run_turn(state, &mut input, &renderer, &chat_id, &persona_name, TurnKind::Send, &mut typed_ahead)
                            .await?;
                    } else {
                        println!("  {} Message {number} updated.", style("✓").green().bold());
                    }
                }
                ChatCommand::Delete(number) => {
                    let messages = state.chat_service.history(&chat_id).await?;
                    match message_at(&messages, number) {
                        Some(target) => {
                            state.chat_service.delete_message(&target.id).await?;
                            println!("  {} Message {number} deleted.", style("✓").green().bold());
                        }
                        None => print_warning(&format!("There is no message {number}.")),
                    }
                }
                ChatCommand::Retry => {
                    run_turn(state, &mut input, &renderer, &chat_id, &persona_name, TurnKind::Retry, &mut typed_ahead)
                        .await?;
                }
                ChatCommand::Rename(title) => {
                    if state.chat_service.rename_chat(&chat_id, &title).await? {
                        println!("  {} Chat renamed to '{}'", style("✓").green().bold(), style(title.trim()).bold());
                    } else {
                        print_warning("Title must not be blank.");
                    }
                }
                ChatCommand::Image(path) => {
                    if let Some(path) = check_image(&path).await {
                        let settings = state.settings_service.load().await?;
                        if !settings.supports_images() {
                            print_warning(&format!(
                                "{} does not accept images; the picture will not be sent.",
                                settings.effective_model()
                            ));
                        }
                        println!(
                            "  {} Attached {} to your next message.",
                            style("+").cyan().bold(),
                            style(&path).dim()
                        );
                        pending_image = Some(path);
                    }
                }
                ChatCommand::Invalid(message) => print_warning(&message),
            }
            continue;
        }

        state
            .chat_service
            .add_user_message(&chat_id, &text, pending_image.take())
            .await?;
        run_turn(state, &mut input, &renderer, &chat_id, &persona_name, TurnKind::Send, &mut typed_ahead)
            .await?;
    }

    input.flush();
    Ok(())
}

/// Resolve the persona for a new chat: the requested one, a picker, or the fallback.
async fn pick_persona(state: &AppState, requested: Option<String>) -> anyhow::Result<String> {
    if let Some(id) = requested {
        return match state.persona_service.get_persona(&id).await? {
            Some(persona) => Ok(persona.id),
            None => bail!("Persona '{id}' not found. List personas with: parley personas list"),
        };
    }

    let personas = state.persona_service.list_all().await;
    if personas.is_empty() {
        debug!("No persona catalogs available, using the fallback persona");
        return Ok(FALLBACK_PERSONA_ID.to_string());
    }

    let items: Vec<String> = personas
        .iter()
        .map(|entry| {
            if entry.persona.description.is_empty() {
                entry.persona.name.clone()
            } else {
                format!("{} - {}", entry.persona.name, entry.persona.description)
            }
        })
        .collect();

    let selection = Select::new()
        .with_prompt("Who do you want to talk to?")
        .items(&items)
        .default(0)
        .interact()
        .context("Persona selection cancelled")?;

    Ok(personas[selection].persona.id.clone())
}

/// Lines entered while a turn was streaming, replayed in order afterwards.
#[derive(Debug, Default)]
struct TypeAhead {
    lines: VecDeque<String>,
}

impl TypeAhead {
    /// Queue `text`; blank lines are dropped.
    fn push(&mut self, text: String) {
        if !text.trim().is_empty() {
            self.lines.push_back(text);
        }
    }

    fn pop(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    fn len(&self) -> usize {
        self.lines.len()
    }

    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Stream one model turn, letting the user stop it with Ctrl+C.
///
/// Lines typed meanwhile are queued in `typed_ahead` and sent once the
/// turn is over.
async fn run_turn(
    state: &AppState,
    input: &mut ChatInput,
    renderer: &ChatRenderer,
    chat_id: &Uuid,
    persona_name: &str,
    kind: TurnKind,
    typed_ahead: &mut TypeAhead,
) -> anyhow::Result<()> {
    let settings = state.settings_service.load().await?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let mut view = TurnView::new(persona_name);
    let start = Instant::now();

    let turn = async {
        match kind {
            TurnKind::Send => {
                state
                    .chat_service
                    .send_message(chat_id, &settings, tx, cancel.clone())
                    .await
            }
            TurnKind::Retry => {
                state
                    .chat_service
                    .retry(chat_id, &settings, tx, cancel.clone())
                    .await
            }
        }
    };
    tokio::pin!(turn);

    let result = loop {
        tokio::select! {
            result = &mut turn => break result,
            Some(event) = rx.recv() => view.handle(renderer, event),
            event = input.read_line() => match event {
                InputEvent::Interrupted | InputEvent::Eof => cancel.cancel(),
                InputEvent::Message(text) => typed_ahead.push(text),
            },
            _ = tokio::signal::ctrl_c() => cancel.cancel(),
        }
    };

    // Events sent right before the turn returned
    while let Ok(event) = rx.try_recv() {
        view.handle(renderer, event);
    }
    view.finish_spinner();

    match result {
        Ok(TurnOutcome::Completed { .. }) => {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            println!();
            renderer.print_stats_footer(view.output_tokens, elapsed_ms, settings.effective_model());
        }
        Ok(TurnOutcome::Cancelled { .. }) => {
            println!("\n  {}", style("(stopped)").dim());
        }
        Ok(TurnOutcome::Failed { error, .. }) => {
            println!("\n  {} {error}", style("!").red().bold());
            println!("  {}", style("Type /retry to try again.").dim());
        }
        Err(e) => {
            println!("\n  {} {e}", style("!").red().bold());
        }
    }

    if let Some(title) = view.title {
        info!(title = %title, "Chat title generated");
        println!("  {}", style(format!("Chat titled '{title}'")).dim());
    }
    if !typed_ahead.is_empty() {
        println!(
            "  {}",
            style(format!("Sending {} line(s) typed during the answer.", typed_ahead.len())).dim()
        );
    }
    println!();

    Ok(())
}

/// Terminal state of a running turn.
struct TurnView<'a> {
    persona_name: &'a str,
    spinner: Option<ProgressBar>,
    output_tokens: Option<u32>,
    title: Option<String>,
}

impl<'a> TurnView<'a> {
    fn new(persona_name: &'a str) -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(spinner_style);
        }
        spinner.set_message("thinking...");
        spinner.enable_steady_tick(Duration::from_millis(80));

        Self {
            persona_name,
            spinner: Some(spinner),
            output_tokens: None,
            title: None,
        }
    }

    fn handle(&mut self, renderer: &ChatRenderer, event: TurnEvent) {
        match event {
            TurnEvent::Started { message_id } => {
                debug!(message_id = %message_id, "Turn started");
            }
            TurnEvent::Delta { text } => {
                if self.finish_spinner() {
                    print!("\n  {} ", style(self.persona_name).cyan().bold());
                    let _ = std::io::stdout().flush();
                }
                renderer.print_streaming_token(&text);
            }
            TurnEvent::Usage(usage) => self.output_tokens = Some(usage.output_tokens),
            TurnEvent::Failed { .. } => {
                self.finish_spinner();
            }
            TurnEvent::TitleGenerated { title } => self.title = Some(title),
        }
    }

    /// Clear the spinner. Returns true the first time.
    fn finish_spinner(&mut self) -> bool {
        match self.spinner.take() {
            Some(spinner) => {
                spinner.finish_and_clear();
                true
            }
            None => false,
        }
    }
}

/// The message shown as number `number` (1-based) by `/history`.
fn message_at(messages: &[ChatMessage], number: usize) -> Option<&ChatMessage> {
    number.checked_sub(1).and_then(|i| messages.get(i))
}

/// Validate an image path for `/image`, printing why it was rejected.
async fn check_image(path: &str) -> Option<String> {
    let Some(attachment) = ImageAttachment::from_path(path) else {
        print_warning("Only PNG, JPEG, WebP and HEIC images can be attached.");
        return None;
    };
    match tokio::fs::metadata(Path::new(&attachment.path)).await {
        Ok(meta) if meta.is_file() => Some(attachment.path),
        _ => {
            print_warning(&format!("File not found: {path}"));
            None
        }
    }
}

fn print_warning(message: &str) {
    println!("  {} {message}", style("!").yellow().bold());
}
