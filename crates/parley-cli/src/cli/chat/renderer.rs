//! Terminal rendering of assistant answers.
//!
//! Streaming chunks are printed raw as they arrive. Stored answers (the
//! transcript view) are split into prose and fenced code: prose goes through
//! `termimad`, code through `syntect`.

use std::io::Write;

use console::style;
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::as_24_bit_terminal_escaped;
use termimad::MadSkin;
use termimad::crossterm::style::Color as SkinColor;

const CODE_THEME: &str = "base16-ocean.dark";
const MAX_RULE_WIDTH: usize = 60;

/// A run of markdown that is rendered as a unit.
#[derive(Debug, PartialEq, Eq)]
enum Block<'a> {
    Prose(String),
    Code { lang: &'a str, body: String },
}

/// Split markdown into prose and fenced code. An unterminated fence runs to
/// the end of the text, which happens for cut-off answers.
fn split_blocks(markdown: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut fence: Option<&str> = None;

    for line in markdown.lines() {
        let trimmed = line.trim_start();
        match (fence, trimmed.strip_prefix("```")) {
            (None, Some(lang)) => {
                if !current.trim().is_empty() {
                    blocks.push(Block::Prose(std::mem::take(&mut current)));
                }
                current.clear();
                fence = Some(lang.trim());
            }
            (Some(lang), Some(_)) => {
                blocks.push(Block::Code {
                    lang,
                    body: std::mem::take(&mut current),
                });
                fence = None;
            }
            _ => {
                current.push_str(line);
                current.push('\n');
            }
        }
    }

    match fence {
        Some(lang) if !current.is_empty() => blocks.push(Block::Code {
            lang,
            body: current,
        }),
        None if !current.trim().is_empty() => blocks.push(Block::Prose(current)),
        _ => {}
    }
    blocks
}

pub struct ChatRenderer {
    skin: MadSkin,
    syntaxes: SyntaxSet,
    themes: ThemeSet,
}

impl ChatRenderer {
    pub fn new() -> Self {
        let mut skin = MadSkin::default_dark();
        skin.bold.set_fg(SkinColor::Cyan);
        skin.inline_code.set_fg(SkinColor::Yellow);
        for header in skin.headers.iter_mut().take(2) {
            header.set_fg(SkinColor::Cyan);
        }

        Self {
            skin,
            syntaxes: SyntaxSet::load_defaults_newlines(),
            themes: ThemeSet::load_defaults(),
        }
    }

    /// Render a stored answer for the terminal.
    pub fn render_final(&self, markdown: &str) -> String {
        split_blocks(markdown)
            .into_iter()
            .map(|block| match block {
                Block::Prose(text) => self.skin.term_text(&text).to_string(),
                Block::Code { lang, body } => self.highlight(&body, lang),
            })
            .collect()
    }

    pub fn print_streaming_token(&self, token: &str) {
        print!("{token}");
        let _ = std::io::stdout().flush();
    }

    /// Footer printed after a completed answer: token count, elapsed time and model.
    pub fn print_stats_footer(&self, tokens: Option<u32>, response_ms: u64, model: &str) {
        let mut parts = Vec::with_capacity(3);
        if let Some(tokens) = tokens {
            parts.push(format!("{tokens} tokens"));
        }
        parts.push(format!("{:.1}s", response_ms as f64 / 1000.0));
        parts.push(model.to_string());

        println!("\n  {}", style(format!("| {}", parts.join(" \u{00b7} "))).dim());
    }

    fn highlight(&self, code: &str, lang: &str) -> String {
        let label = if lang.is_empty() { "code" } else { lang };
        let width = crossterm::terminal::size()
            .map(|(cols, _)| usize::from(cols).saturating_sub(4))
            .unwrap_or(MAX_RULE_WIDTH)
            .min(MAX_RULE_WIDTH);
        let rule = format!("--- {label} {}", "-".repeat(width.saturating_sub(label.len() + 5)));

        let mut out = format!("  {}\n", style(rule.trim_end()).dim());

        let syntax = self
            .syntaxes
            .find_syntax_by_token(lang)
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text());
        let Some(theme) = self.themes.themes.get(CODE_THEME) else {
            for line in code.lines() {
                out.push_str(&format!("  {line}\n"));
            }
            return out;
        };

        let mut highlighter = HighlightLines::new(syntax, theme);
        for line in code.lines() {
            match highlighter.highlight_line(line, &self.syntaxes) {
                Ok(ranges) => {
                    out.push_str(&format!("  {}\x1b[0m\n", as_24_bit_terminal_escaped(&ranges, false)))
                }
                Err(_) => out.push_str(&format!("  {line}\n")),
            }
        }
        out
    }
}

impl Default for ChatRenderer {
    fn default() -> Self {
        Self::new()
    }
}
