mod transcript;
mod restore;
pub mod persistence;

pub use transcript::{ConversationTurn, Role, SessionSnapshot};
pub use restore::SessionRestorer;
pub use persistence::{HistoryStore, WriteJob};
