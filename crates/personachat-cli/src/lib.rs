// Library interface for personachat-cli
// This allows integration tests to drive the chat loop and input handling.

pub mod app;
pub mod commands;

pub use commands::{classify_input, InputAction};
