use chrono::{DateTime, TimeZone};

/// Words that end the conversation (compared case-insensitively).
pub const EXIT_WORDS: [&str; 3] = ["\\bye", "exit", "quit"];

/// What a line typed at the chat prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// End the conversation, offering to save it.
    Exit,
    /// Blank line, nothing to send.
    Empty,
    /// Send this text to the model.
    Message(String),
}

pub fn classify_input(line: &str) -> InputAction {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return InputAction::Empty;
    }
    let lower = trimmed.to_lowercase();
    if EXIT_WORDS.contains(&lower.as_str()) {
        InputAction::Exit
    } else {
        InputAction::Message(trimmed.to_string())
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Parse a 1-based menu choice into an index below `len`.
pub fn parse_choice(input: &str, len: usize) -> Option<usize> {
    match input.trim().parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => Some(n - 1),
        _ => None,
    }
}

/// Append the local send time, so the model sees when each message was written.
pub fn with_timestamp<Tz>(text: &str, now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{}[{}]", text, now.format("%Y-%m-%d %H:%M:%S %A"))
}
