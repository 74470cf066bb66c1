//! Slash command parsing for the chat loop.
//!
//! Commands start with `/`. Message numbers are 1-based and match the
//! numbering printed by `/history`.

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Clear the terminal screen.
    Clear,
    /// Leave the chat.
    Exit,
    /// Print the numbered transcript.
    History,
    /// Replace the text of message N, forking if it is not the last one.
    Edit { number: usize, text: String },
    /// Delete message N.
    Delete(usize),
    /// Ask for a fresh answer to the latest user message.
    Retry,
    /// Rename the chat.
    Rename(String),
    /// Attach an image to the next message.
    Image(String),
    /// Malformed or unknown command, with a message for the user.
    Invalid(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd.to_lowercase(), arg.trim()),
        None => (trimmed.to_lowercase(), ""),
    };

    let command = match cmd.as_str() {
        "/help" | "/h" | "/?" => ChatCommand::Help,
        "/clear" | "/cls" => ChatCommand::Clear,
        "/exit" | "/quit" | "/q" => ChatCommand::Exit,
        "/history" => ChatCommand::History,
        "/retry" | "/regenerate" => ChatCommand::Retry,
        "/edit" => match arg.split_once(char::is_whitespace) {
            Some((number, text)) if !text.trim().is_empty() => match parse_number(number) {
                Some(number) => ChatCommand::Edit {
                    number,
                    text: text.trim().to_string(),
                },
                None => invalid_number("/edit", number),
            },
            _ => ChatCommand::Invalid("Usage: /edit N TEXT".to_string()),
        },
        "/delete" | "/del" => match parse_number(arg) {
            Some(number) => ChatCommand::Delete(number),
            None if arg.is_empty() => ChatCommand::Invalid("Usage: /delete N".to_string()),
            None => invalid_number("/delete", arg),
        },
        "/rename" => {
            if arg.is_empty() {
                ChatCommand::Invalid("Usage: /rename TITLE".to_string())
            } else {
                ChatCommand::Rename(arg.to_string())
            }
        }
        "/image" | "/img" => {
            if arg.is_empty() {
                ChatCommand::Invalid("Usage: /image PATH".to_string())
            } else {
                ChatCommand::Image(unquote(arg).to_string())
            }
        }
        other => ChatCommand::Invalid(format!(
            "Unknown command: {other}. Type /help for available commands."
        )),
    };

    Some(command)
}

fn parse_number(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok().filter(|n| *n > 0)
}

fn invalid_number(cmd: &str, raw: &str) -> ChatCommand {
    ChatCommand::Invalid(format!("{cmd}: '{raw}' is not a message number"))
}

/// Strip one pair of matching quotes, as left by drag-and-drop into a terminal.
fn unquote(raw: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = raw
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    raw
}

/// Print the help text listing all available commands.
pub fn print_help() {
    let rows = [
        ("/help", "Show this help message"),
        ("/history", "Show the numbered conversation"),
        ("/edit N TEXT", "Edit message N (later messages are dropped)"),
        ("/delete N", "Delete message N"),
        ("/retry", "Ask for a new answer to your last message"),
        ("/rename TITLE", "Rename this chat"),
        ("/image PATH", "Attach an image to your next message"),
        ("/clear", "Clear the screen"),
        ("/exit", "Leave the chat"),
    ];

    println!();
    println!("  {}", style("Available commands:").bold());
    println!();
    for (cmd, description) in rows {
        println!("  {:<16} {}", style(cmd).cyan(), description);
    }
    println!();
    println!(
        "  {}",
        style("Ctrl+C stops a running answer, Ctrl+D exits").dim()
    );
    println!();
}
