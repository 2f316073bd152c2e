// beech-core/src/utils.rs
//! Small string helpers shared by the orchestrator and the CLI.

/// Truncates to at most `max_chars` characters, ending in "..." when cut.
/// Counts characters, not bytes.
pub fn truncate_string(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    if max_chars < 3 {
        return input.chars().take(max_chars).collect();
    }
    let kept: String = input.chars().take(max_chars - 3).collect();
    format!("{}...", kept)
}

/// A single-line, truncated rendering of user text for log fields.
pub fn log_preview(input: &str, max_chars: usize) -> String {
    let single_line = input.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_string(&single_line, max_chars)
}
