//! Welcome banner display for chat sessions.

use console::style;

/// Print the banner shown when a chat opens.
pub fn print_welcome_banner(
    persona_name: &str,
    description: &str,
    title: &str,
    provider: &str,
    model: &str,
    chat_id: &str,
) {
    println!();
    println!("  * {}", style(persona_name).cyan().bold());
    if !description.is_empty() {
        println!("  {}", style(description).dim());
    }
    println!();
    println!("  {}     {}", style("Chat:").bold(), style(title).dim());
    println!(
        "  {}    {}",
        style("Model:").bold(),
        style(format!("{model} ({provider})")).dim()
    );
    println!(
        "  {}       {}",
        style("ID:").bold(),
        style(&chat_id[..8.min(chat_id.len())]).dim()
    );
    println!();
    println!(
        "  {}",
        style("Type /help for commands, Ctrl+C stops an answer, Ctrl+D exits").dim()
    );
    println!("  {}", style("---").dim());
    println!();
}
