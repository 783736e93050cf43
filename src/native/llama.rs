use std::path::Path;

use llama_cpp::standard_sampler::StandardSampler;
use llama_cpp::{LlamaModel, LlamaParams, SessionParams};
use tracing::{debug, info, warn};

use super::{NativeError, NativeInference};
use crate::config::InferenceConfig;

/// Engine parameters taken from the `[inference]` settings.
#[derive(Debug, Clone, Copy)]
pub struct LlamaOptions {
    pub n_gpu_layers: u32,
    pub use_mmap: bool,
    pub use_mlock: bool,
    pub context_size: u32,
    pub batch_size: u32,
}

impl From<&InferenceConfig> for LlamaOptions {
    fn from(config: &InferenceConfig) -> Self {
        Self {
            n_gpu_layers: config.n_gpu_layers,
            use_mmap: config.use_mmap,
            use_mlock: config.use_mlock,
            context_size: config.context_size,
            batch_size: config.batch_size,
        }
    }
}

/// llama.cpp-backed native engine.
///
/// Each generation runs in a fresh `LlamaSession`, so prompts do not share
/// context with each other.
pub struct LlamaInference {
    options: LlamaOptions,
    model: Option<LlamaModel>,
}

impl LlamaInference {
    pub fn new(options: LlamaOptions) -> Self {
        Self { options, model: None }
    }
}

impl NativeInference for LlamaInference {
    fn load_model(&mut self, path: &Path) -> Result<(), NativeError> {
        let LlamaOptions { n_gpu_layers, use_mmap, use_mlock, .. } = self.options;
        let params = LlamaParams { n_gpu_layers, use_mmap, use_mlock, ..Default::default() };
        info!(n_gpu_layers, use_mmap, use_mlock, "Loading model via llama_cpp: {}", path.display());

        let model = LlamaModel::load_from_file(path, params)
            .map_err(|e| NativeError::Load(format!("llama_cpp could not load {}: {}", path.display(), e)))?;

        // Replacing an existing model drops it here.
        self.model = Some(model);
        info!("Model loaded via llama_cpp");
        Ok(())
    }

    fn generate_text(&mut self, prompt: &str, max_tokens: u32) -> Result<String, NativeError> {
        let model = self.model.as_ref().ok_or(NativeError::NotLoaded)?;
        if max_tokens == 0 {
            return Ok(String::new());
        }

        let session_params = SessionParams {
            n_ctx: self.options.context_size,
            n_batch: self.options.batch_size,
            ..Default::default()
        };
        let mut session = model.create_session(session_params)
            .map_err(|e| NativeError::Generation(format!("Failed to create LlamaSession: {}", e)))?;

        session.advance_context(prompt)
            .map_err(|e| NativeError::Generation(format!("Failed to advance context: {}", e)))?;
        debug!("Context advanced with {} prompt bytes", prompt.len());

        let max_tokens = max_tokens as usize;
        let completions = session.start_completing_with(StandardSampler::default(), max_tokens)
            .map_err(|e| NativeError::Generation(format!("Failed to start completion: {}", e)))?;

        let mut response = String::new();
        let mut generated = 0;
        for token in completions {
            response.push_str(&model.token_to_piece(token));
            generated += 1;
            if generated >= max_tokens {
                warn!("Reached max token limit ({}) during generation.", max_tokens);
                break;
            }
        }

        info!(generated, "Completion finished");
        Ok(response)
    }

    fn unload_model(&mut self) {
        if self.model.take().is_some() {
            info!("Model released from llama_cpp");
        }
    }
}
