use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Preset name plus the full transcript. The serialized form doubles as the
/// on-disk history format: `{"preset": ..., "history": [{role, content}, ...]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    #[serde(rename = "preset")]
    pub preset_name: String,
    pub history: Vec<ConversationTurn>,
}

impl SessionSnapshot {
    /// A fresh session whose first turn carries the persona text.
    pub fn new(preset_name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            preset_name: preset_name.into(),
            history: vec![ConversationTurn::system(system_prompt)],
        }
    }

    pub fn from_parts(preset_name: impl Into<String>, history: Vec<ConversationTurn>) -> Self {
        Self {
            preset_name: preset_name.into(),
            history,
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.history.push(turn);
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.history
            .iter()
            .find(|t| t.role == Role::System)
            .map(|t| t.content.as_str())
    }

    /// Overwrite the first system turn's content, or insert one at the front
    /// when the transcript has none. Every other turn is left as is.
    pub fn replace_system_prompt(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self.history.iter_mut().find(|t| t.role == Role::System) {
            Some(turn) => turn.content = text,
            None => self.history.insert(0, ConversationTurn::system(text)),
        }
    }

    /// Drop older turns, keeping the first system turn and the last `n` others.
    pub fn keep_recent(&mut self, n: usize) {
        let system = self
            .history
            .iter()
            .position(|t| t.role == Role::System)
            .map(|idx| self.history.remove(idx));

        let excess = self.history.len().saturating_sub(n);
        self.history.drain(..excess);

        if let Some(system) = system {
            self.history.insert(0, system);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionSnapshot {
        SessionSnapshot::from_parts(
            "Lin",
            vec![
                ConversationTurn::system("OLD"),
                ConversationTurn::user("hi"),
                ConversationTurn::assistant("hello"),
            ],
        )
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["preset"], "Lin");
        assert_eq!(json["history"][0]["role"], "system");
        assert_eq!(json["history"][2]["content"], "hello");
    }

    #[test]
    fn test_replace_system_prompt_in_place() {
        let mut snap = sample();
        snap.replace_system_prompt("NEW");
        assert_eq!(snap.len(), 3);
        assert_eq!(snap.history[0], ConversationTurn::system("NEW"));
        assert_eq!(snap.history[1], ConversationTurn::user("hi"));
    }

    #[test]
    fn test_replace_system_prompt_only_first() {
        let mut snap = sample();
        snap.push(ConversationTurn::system("second"));
        snap.replace_system_prompt("NEW");
        assert_eq!(snap.history[0].content, "NEW");
        assert_eq!(snap.history[3].content, "second");
    }

    #[test]
    fn test_replace_system_prompt_inserts_when_absent() {
        let mut snap = SessionSnapshot::from_parts("p", vec![ConversationTurn::user("q")]);
        snap.replace_system_prompt("persona");
        assert_eq!(snap.system_prompt(), Some("persona"));
        assert_eq!(snap.history[1], ConversationTurn::user("q"));
    }

    #[test]
    fn test_keep_recent_preserves_system_turn() {
        let mut snap = SessionSnapshot::new("p", "persona");
        for i in 0..6 {
            snap.push(ConversationTurn::user(format!("u{i}")));
        }
        snap.keep_recent(4);
        assert_eq!(snap.len(), 5);
        assert_eq!(snap.history[0].role, Role::System);
        assert_eq!(snap.history[1].content, "u2");
        assert_eq!(snap.history[4].content, "u5");
    }

    #[test]
    fn test_keep_recent_short_history_untouched() {
        let mut snap = sample();
        snap.keep_recent(4);
        assert_eq!(snap, sample());
    }
}
