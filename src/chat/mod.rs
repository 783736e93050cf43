// Declare the display submodule
mod display;

// Declare the chat submodule (containing the chat_loop logic)
mod chat;

// Declare the command_handlers module
mod command_handlers;

pub mod transcript;

// Re-export the public items from the chat submodule
pub use chat::{chat_loop, ChatOptions};
pub use transcript::{ChatMessage, Role, Transcript};
