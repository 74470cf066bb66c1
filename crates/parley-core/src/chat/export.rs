//! Transcript export (Markdown or JSON).

use std::fmt::Write as _;

use parley_types::chat::{Chat, ChatMessage, ExportFormat, Sender};

/// Render a chat and its messages in the requested format.
pub fn render_export(
    chat: &Chat,
    persona_name: &str,
    messages: &[ChatMessage],
    format: ExportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ExportFormat::Json => {
            let export = serde_json::json!({
                "chat": chat,
                "persona": persona_name,
                "messages": messages,
            });
            serde_json::to_string_pretty(&export)
        }
        ExportFormat::Markdown => Ok(render_markdown(chat, persona_name, messages)),
    }
}

fn render_markdown(chat: &Chat, persona_name: &str, messages: &[ChatMessage]) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "# {}\n", chat.title);
    let _ = writeln!(
        out,
        "- **Created:** {}",
        chat.created_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(out, "- **Persona:** {persona_name}");
    let _ = writeln!(out, "- **Messages:** {}\n", messages.len());
    let _ = writeln!(out, "---\n");

    for msg in messages {
        let label = match msg.sender {
            Sender::User => "**You**".to_string(),
            Sender::Model => match &msg.model {
                Some(model) => format!("**{persona_name}** _{model}_"),
                None => format!("**{persona_name}**"),
            },
        };
        let timestamp = msg.timestamp.format("%H:%M");
        let _ = writeln!(out, "### {label} ({timestamp})\n");
        if let Some(path) = &msg.image_path {
            let _ = writeln!(out, "![attachment]({path})\n");
        }
        if msg.is_error {
            let _ = writeln!(out, "> {}\n", msg.text);
        } else {
            let _ = writeln!(out, "{}\n", msg.text);
        }
    }

    out
}
