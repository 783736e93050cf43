use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Rejection category reported alongside every bridge error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    LoadError,
    ModelNotLoaded,
    GenerationError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::LoadError => "LOAD_ERROR",
            ErrorCode::ModelNotLoaded => "MODEL_NOT_LOADED",
            ErrorCode::GenerationError => "GENERATION_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorized rejection of a bridge operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Failed to load model: {0}")]
    Load(String),

    #[error("The model has not been loaded")]
    ModelNotLoaded,

    #[error("Failed to generate text: {0}")]
    Generation(String),
}

impl BridgeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::Load(_) => ErrorCode::LoadError,
            BridgeError::ModelNotLoaded => ErrorCode::ModelNotLoaded,
            BridgeError::Generation(_) => ErrorCode::GenerationError,
        }
    }
}
