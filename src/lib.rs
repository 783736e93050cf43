//! Promise-based bridge between an application and a native LLM inference
//! engine: model assets are copied into local storage on first use, and every
//! native call runs on a single background worker.

pub mod assets;
pub mod bridge;
pub mod chat;
pub mod config;
pub mod native;

pub use bridge::{BridgeError, ErrorCode, LlamaBridge, LoadedModel, Promise};
