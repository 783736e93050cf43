use std::error::Error;
use std::io::Write;

use rustyline::DefaultEditor;

use super::command_handlers::{
    handle_generate,
    handle_load_model,
    handle_save,
    handle_status,
    handle_unload_model,
    ChatContext,
};
use super::display::display_reply;
use super::transcript::Transcript;
use crate::bridge::LlamaBridge;

const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const BRIGHT_CYAN: &str = "\x1b[96m";
const RESET: &str = "\x1b[0m";

const GREETING: &str = "Hello, how can I help you today?";

/// Settings for one chat session.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Model loaded at startup and on demand
    pub model_name: String,
    /// Token limit for every reply
    pub max_tokens: u32,
    /// Load the model before the first prompt instead of on demand
    pub autoload: bool,
}

fn print_help() {
    println!("\n{CYAN}Chat Commands{RESET}");
    println!("{BRIGHT_CYAN}{}{RESET}", "=".repeat(60));
    println!("{GREEN}llama exit, llama bye, llama quit{RESET} - Exit the chat");
    println!("{GREEN}llama help{RESET}                     - Show this help message");
    println!("{GREEN}llama clear{RESET}                    - Clear the screen");
    println!("{GREEN}llama load [name]{RESET}              - Load a model (the configured one by default)");
    println!("{GREEN}llama unload{RESET}                   - Unload the current model");
    println!("{GREEN}llama status{RESET}                   - Show the loaded model");
    println!("{GREEN}llama save <file>{RESET}              - Save the conversation as JSON");
    println!("Anything else is sent to the model as a prompt.");
    println!();
}

// --- Main Chat Loop ---

pub async fn chat_loop(bridge: &LlamaBridge, options: ChatOptions) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("Starting chat session");
    print_help();

    let mut transcript = Transcript::with_greeting(GREETING);
    let mut context = ChatContext {
        bridge,
        transcript: &mut transcript,
        model_name: &options.model_name,
        max_tokens: options.max_tokens,
    };

    if options.autoload {
        handle_load_model(&mut context, None).await;
    }
    display_reply(GREETING);

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("[you] > ");

        match readline {
            Ok(input) => {
                let input_trimmed = input.trim();
                if input_trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input_trimmed);

                let command_lowercase = input_trimmed.to_lowercase();

                if ["llama exit", "llama bye", "llama quit"].contains(&command_lowercase.as_str()) {
                    println!("Goodbye!");
                    break;
                }

                match command_lowercase.as_str() {
                    "llama help" => print_help(),
                    "llama clear" => {
                        print!("\x1B[2J\x1B[1;1H");
                        std::io::stdout().flush()?;
                    }
                    "llama load" => handle_load_model(&mut context, None).await,
                    "llama unload" => handle_unload_model(&mut context).await,
                    "llama status" => handle_status(&context),
                    cmd if cmd.starts_with("llama load ") => {
                        let name = input_trimmed["llama load ".len()..].trim();
                        handle_load_model(&mut context, Some(name)).await;
                    }
                    cmd if cmd.starts_with("llama save ") => {
                        let path = input_trimmed["llama save ".len()..].trim();
                        handle_save(&context, path);
                    }
                    "llama save" => println!("Usage: llama save <file>"),
                    _ => handle_generate(&mut context, input_trimmed).await,
                }
            }
            Err(_) => {
                println!("Goodbye!");
                break;
            }
        }
    }
    Ok(())
}
