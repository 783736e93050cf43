use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use llama_bridge::assets::{DirAssetSource, ModelStore};
use llama_bridge::chat::{chat_loop, ChatOptions};
use llama_bridge::config::Settings;
use llama_bridge::LlamaBridge;

#[derive(Parser)]
#[command(name = "llama-bridge", version, about = "Chat with a local model through the inference bridge")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat session (the default)
    Chat {
        /// Model name under the assets' models/ directory
        #[arg(long)]
        model: Option<String>,
        /// Token limit per reply
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Load the model on the first prompt instead of at startup
        #[arg(long)]
        no_autoload: bool,
    },
    /// Load a model, generate one reply and unload it
    Generate {
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        max_tokens: Option<u32>,
    },
    /// Copy a model from the assets into local storage without loading it
    Prepare {
        #[arg(long)]
        model: Option<String>,
    },
}

/// Main entry point for the llama-bridge application
///
/// Loads settings, initializes logging and dispatches to one of three modes:
/// - Chat: interactive session on top of the bridge
/// - Generate: one-shot generation
/// - Prepare: copy a model asset into local storage
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load settings first
    let settings = Settings::new().context("Failed to load settings")?;

    // Initialize the subscriber first, before any file operations
    let log_dir = settings.logging.file.as_deref().unwrap_or_else(|| Path::new("logs"));
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::RollingFileAppender::new(
        tracing_appender::rolling::Rotation::DAILY,
        log_dir,
        "llama-bridge",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        // Disable ANSI colors for cleaner log files
        .with_ansi(false)
        .with_line_number(true)
        .with_file(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(false)
        .with_env_filter(EnvFilter::new(&settings.logging.level))
        .init();

    info!("llama-bridge starting up...");
    info!("Log directory: {}", std::fs::canonicalize(log_dir)?.display());

    match cli.command.unwrap_or(Command::Chat { model: None, max_tokens: None, no_autoload: false }) {
        Command::Chat { model, max_tokens, no_autoload } => {
            let bridge = LlamaBridge::from_settings(&settings)?;
            let options = ChatOptions {
                model_name: model.unwrap_or_else(|| settings.models.default_model.clone()),
                max_tokens: max_tokens.unwrap_or(settings.inference.max_tokens),
                autoload: !no_autoload,
            };
            chat_loop(&bridge, options)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            bridge.shutdown();
        }
        Command::Generate { prompt, model, max_tokens } => {
            let bridge = LlamaBridge::from_settings(&settings)?;
            let model = model.unwrap_or_else(|| settings.models.default_model.clone());
            let max_tokens = max_tokens.unwrap_or(settings.inference.max_tokens);

            let load = bridge.load_model(&model);
            let generate = bridge.generate_text(&prompt, max_tokens);
            let unload = bridge.unload_model();

            let outcome = match load.await {
                Ok(_) => generate.await,
                Err(e) => Err(e),
            };
            unload.await?;
            bridge.shutdown();

            let text = outcome.map_err(|e| anyhow::anyhow!("[{}] {}", e.code(), e))?;
            println!("{}", text.trim());
        }
        Command::Prepare { model } => {
            let model = model.unwrap_or_else(|| settings.models.default_model.clone());
            let store = ModelStore::new(
                &settings.models.storage_dir,
                DirAssetSource::new(&settings.models.assets_dir),
            );
            let resolved = store.resolve(&model)?;
            if resolved.copied {
                println!("Copied {} to {}", model, resolved.path.display());
            } else {
                println!("{} is already available at {}", model, resolved.path.display());
            }
        }
    }

    Ok(())
}
