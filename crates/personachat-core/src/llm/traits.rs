use crate::context::ConversationTurn;
use crate::error::PersonaError;

/// A chat-completion backend. Given the full transcript, returns the
/// assistant's reply text.
#[async_trait::async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, turns: &[ConversationTurn]) -> Result<String, PersonaError>;
}
