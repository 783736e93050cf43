use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::display::{display_error, display_info, display_model_status, display_reply};
use super::transcript::{Role, Transcript};
use crate::bridge::{BridgeError, LlamaBridge, Promise};

/// Shared state the chat command handlers work on.
pub(super) struct ChatContext<'a> {
    pub bridge: &'a LlamaBridge,
    pub transcript: &'a mut Transcript,
    /// Model loaded on demand and by `llama load` without a name
    pub model_name: &'a str,
    pub max_tokens: u32,
}

/// Awaits a bridge promise while showing a spinner.
async fn with_spinner<T>(message: String, promise: Promise<T>) -> Result<T, BridgeError> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(message);

    let outcome = promise.await;
    pb.finish_and_clear();
    outcome
}

pub(super) async fn handle_load_model(context: &mut ChatContext<'_>, model_name: Option<&str>) {
    let name = model_name.unwrap_or(context.model_name);
    let promise = context.bridge.load_model(name);
    match with_spinner(format!("Loading model {}...", name), promise).await {
        Ok(message) => display_info(&message),
        Err(e) => display_error(&e),
    }
}

pub(super) async fn handle_unload_model(context: &mut ChatContext<'_>) {
    // Unloading never rejects.
    match context.bridge.unload_model().await {
        Ok(message) => display_info(&message),
        Err(e) => display_error(&e),
    }
}

pub(super) fn handle_status(context: &ChatContext<'_>) {
    display_model_status(context.bridge.loaded_model().as_ref());
}

pub(super) fn handle_save(context: &ChatContext<'_>, path: &str) {
    match context.transcript.save(Path::new(path)) {
        Ok(()) => display_info(&format!("Saved {} messages to {}", context.transcript.messages().len(), path)),
        Err(e) => println!("Error saving transcript: {}", e),
    }
}

/// Sends a prompt to the model, loading the configured model first if
/// nothing is loaded yet.
pub(super) async fn handle_generate(context: &mut ChatContext<'_>, prompt: &str) {
    context.transcript.push(Role::User, prompt);

    let generate = if context.bridge.is_model_loaded() {
        context.bridge.generate_text(prompt, context.max_tokens)
    } else {
        match generate_after_load(context, prompt).await {
            Ok(generate) => generate,
            Err(e) => {
                display_error(&e);
                return;
            }
        }
    };
    finish_generate(context, generate).await;
}

/// Queues a load of the configured model with the generate right behind it.
/// A failed load drops the generate, which could only report MODEL_NOT_LOADED.
async fn generate_after_load(context: &ChatContext<'_>, prompt: &str) -> Result<Promise<String>, BridgeError> {
    let load = context.bridge.load_model(context.model_name);
    let generate = context.bridge.generate_text(prompt, context.max_tokens);
    with_spinner(format!("Loading model {}...", context.model_name), load).await?;
    Ok(generate)
}

async fn finish_generate(context: &mut ChatContext<'_>, generate: Promise<String>) {
    match with_spinner("Thinking...".to_string(), generate).await {
        Ok(text) => {
            let reply = text.trim();
            if reply.is_empty() {
                println!("(the model returned no text)");
                return;
            }
            display_reply(reply);
            context.transcript.push(Role::Assistant, reply);
        }
        Err(e) => display_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::assets::{DirAssetSource, ModelStore};
    use crate::bridge::ErrorCode;
    use crate::native::{NativeError, NativeInference};

    struct EchoEngine;

    impl NativeInference for EchoEngine {
        fn load_model(&mut self, _path: &Path) -> Result<(), NativeError> {
            Ok(())
        }

        fn generate_text(&mut self, prompt: &str, _max_tokens: u32) -> Result<String, NativeError> {
            Ok(format!(" {}", prompt))
        }

        fn unload_model(&mut self) {}
    }

    fn scratch_bridge() -> (PathBuf, LlamaBridge) {
        let root = std::env::temp_dir().join(format!("llama-bridge-chat-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(root.join("assets").join(crate::assets::MODELS_SUBDIR)).unwrap();
        let store = ModelStore::new(root.join("storage"), DirAssetSource::new(root.join("assets")));
        let bridge = LlamaBridge::new(store, || EchoEngine).unwrap();
        (root, bridge)
    }

    #[tokio::test]
    async fn test_failed_on_demand_load_reports_only_the_load_error() {
        let (root, bridge) = scratch_bridge();
        let mut transcript = Transcript::with_greeting("hi");
        let context = ChatContext { bridge: &bridge, transcript: &mut transcript, model_name: "absent.gguf", max_tokens: 8 };

        let err = generate_after_load(&context, "Hello").await.err().unwrap();

        assert_eq!(err.code(), ErrorCode::LoadError);
        fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn test_on_demand_load_hands_back_the_queued_generate() {
        let (root, bridge) = scratch_bridge();
        fs::write(root.join("assets").join(crate::assets::MODELS_SUBDIR).join("tiny.gguf"), b"weights").unwrap();
        let mut transcript = Transcript::with_greeting("hi");
        let context = ChatContext { bridge: &bridge, transcript: &mut transcript, model_name: "tiny.gguf", max_tokens: 8 };

        let generate = generate_after_load(&context, "Hello").await.unwrap();

        assert_eq!(generate.await.unwrap(), " Hello");
        fs::remove_dir_all(&root).ok();
    }
}
