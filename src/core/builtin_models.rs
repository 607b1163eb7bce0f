//! Built-in model catalog
//!
//! This module loads the Bedrock models bundled in builtin_models.toml and
//! resolves user-supplied model names against them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinModel {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub images: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct BuiltinModelsConfig {
    models: Vec<BuiltinModel>,
}

/// Load built-in models from the embedded configuration
pub fn load_builtin_models() -> Vec<BuiltinModel> {
    const CONFIG_CONTENT: &str = include_str!("../builtin_models.toml");

    let config: BuiltinModelsConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_models.toml");

    config.models
}

/// The model used when neither the config file nor the CLI picks one.
pub fn default_model() -> BuiltinModel {
    load_builtin_models()
        .into_iter()
        .next()
        .expect("builtin_models.toml lists at least one model")
}

/// Find a built-in model by id or display name (case-insensitive)
pub fn find_builtin_model(name: &str) -> Option<BuiltinModel> {
    load_builtin_models()
        .into_iter()
        .find(|m| m.id.eq_ignore_ascii_case(name) || m.display_name.eq_ignore_ascii_case(name))
}

/// Map a display name to its model id; unknown names pass through as raw ids.
pub fn resolve_model_id(name: &str) -> String {
    find_builtin_model(name)
        .map(|m| m.id)
        .unwrap_or_else(|| name.to_string())
}

/// Whether image blocks may be sent to `model_id`.
///
/// Raw ids outside the catalog are trusted, the endpoint will reject them
/// if it disagrees.
pub fn supports_images(model_id: &str) -> bool {
    find_builtin_model(model_id)
        .map(|m| m.images)
        .unwrap_or(true)
}
