// beech-cli/src/rendering.rs
use anyhow::Result;
use beech_core::models::transcript::{FunctionCall, FunctionCallStatus};
use colored::*;
use std::io;
use termimad::{crossterm::style::Color, MadSkin};

fn create_skin() -> MadSkin {
    let mut skin = MadSkin::default();
    skin.bold.set_fg(Color::Green);
    skin.inline_code.set_fg(Color::Cyan);
    skin.inline_code.set_bg(Color::Reset);
    skin.code_block.set_fg(Color::Reset);
    skin.code_block.set_bg(Color::Reset);
    skin.table.set_fg(Color::DarkGrey);
    skin
}

/// Renders an assistant reply (markdown, often with tables) to stdout.
pub fn print_formatted(markdown_text: &str) -> Result<()> {
    let skin = create_skin();
    let mut stdout = io::stdout().lock();
    skin.write_text_on(&mut stdout, markdown_text)?;
    Ok(())
}

/// One line per tool call made during a turn, e.g. `✓ get_accounts`.
pub fn tool_activity_lines(calls: &[FunctionCall]) -> Vec<String> {
    calls
        .iter()
        .map(|call| {
            let marker = match call.status {
                FunctionCallStatus::Success => "✓".green(),
                FunctionCallStatus::Error => "✗".red(),
                FunctionCallStatus::Pending => "…".yellow(),
            };
            let detail = call
                .result
                .as_ref()
                .and_then(|r| r.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("");
            if detail.is_empty() {
                format!("{} {}", marker, call.name.bold())
            } else {
                format!("{} {} {}", marker, call.name.bold(), detail.dimmed())
            }
        })
        .collect()
}
