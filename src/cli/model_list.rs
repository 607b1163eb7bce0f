//! Model listing functionality
//!
//! Prints the built-in Bedrock model catalog and marks the model a new
//! session would use.

use crate::core::builtin_models::load_builtin_models;
use crate::core::config::{Config, ParameterOverrides};

pub fn list_models(config: &Config, overrides: &ParameterOverrides) {
    let selected = config.model_id(overrides);
    let models = load_builtin_models();

    println!("🤖 Available Models on Amazon Bedrock");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    let width = models.iter().map(|m| m.display_name.len()).max().unwrap_or(0);
    for model in &models {
        let marker = if model.id == selected { "*" } else { " " };
        let images = if model.images { "  [images]" } else { "" };
        println!(
            "{marker} {:<width$}  {}{images}",
            model.display_name, model.id
        );
    }

    if !models.iter().any(|m| m.id == selected) {
        println!();
        println!("🎯 Selected model (raw id): {selected}");
    }

    println!();
    println!("💡 Use -m <name or id> to pick a model, or 'bedrock-chat set model <name>' to save one.");
}
