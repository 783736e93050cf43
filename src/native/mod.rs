//! # Native Inference Binding
//!
//! The contract the external inference engine has to satisfy. The bridge only
//! ever talks to the engine through [`NativeInference`], always from its single
//! worker thread, so implementations are free to block and need not be `Send`.

use std::path::Path;

use thiserror::Error;

pub mod llama;

pub use llama::{LlamaInference, LlamaOptions};

/// Errors reported by a native engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    #[error("model load failed: {0}")]
    Load(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("no model loaded in the native engine")]
    NotLoaded,
}

/// Three-operation contract of a native inference engine.
pub trait NativeInference {
    /// Loads the model file at the absolute `path`.
    fn load_model(&mut self, path: &Path) -> Result<(), NativeError>;

    /// Generates a continuation of `prompt`, producing at most `max_tokens` tokens.
    fn generate_text(&mut self, prompt: &str, max_tokens: u32) -> Result<String, NativeError>;

    /// Releases every resource held for the current model. Harmless when none is loaded.
    fn unload_model(&mut self);
}

/// Builds the native engine. Invoked once, on the worker thread.
pub type NativeFactory = Box<dyn FnOnce() -> Box<dyn NativeInference> + Send>;
