use colored::*;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};

use crate::bridge::{BridgeError, LoadedModel};

fn header(label: &str) -> Cell {
    Cell::new(label).fg(comfy_table::Color::Cyan).add_attribute(Attribute::Bold)
}

/// Displays the loaded model, or a notice when none is loaded.
pub fn display_model_status(model: Option<&LoadedModel>) {
    let Some(model) = model else {
        println!("{}", "No model loaded".yellow());
        return;
    };

    let mut table = Table::new();
    table
        .set_header(vec![header("Model"), header("Local path"), header("Loaded at"), header("Copied from assets")])
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new(&model.name).fg(comfy_table::Color::Green),
        Cell::new(model.path.display().to_string()),
        Cell::new(model.loaded_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        Cell::new(if model.copied_from_assets { "yes" } else { "no" }),
    ]);

    println!("{table}");
}

pub fn display_reply(text: &str) {
    println!("{} {}", "[assistant]".bright_cyan().bold(), text);
}

pub fn display_info(message: &str) {
    println!("{}", message.green());
}

/// Shows a rejection with its category code.
pub fn display_error(error: &BridgeError) {
    println!("{} {}", format!("[{}]", error.code()).red().bold(), error.to_string().red());
}
