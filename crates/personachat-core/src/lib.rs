pub mod error;
pub mod config;
pub mod cache;
pub mod context;
pub mod llm;

// Re-export key types
pub use error::{PersonaError, Result};
pub use config::{ConfigStore, ModelSettings};
pub use cache::{DirectoryCache, SettingsCache};
pub use context::{ConversationTurn, HistoryStore, Role, SessionRestorer, SessionSnapshot, WriteJob};
pub use llm::{preprocess_response, ChatClient, OpenAiCompatClient};
