//! `set` and `unset` handling for the config file and the running session.

use std::error::Error;

use crate::core::builtin_models::find_builtin_model;
use crate::core::config::{Config, ConfigKey, ParameterOverrides};
use crate::core::params::GenerationParameters;
use crate::core::session::ChatSession;

fn parse_key(key: &str) -> Result<ConfigKey, Box<dyn Error>> {
    ConfigKey::parse(key).ok_or_else(|| {
        let known: Vec<&str> = ConfigKey::ALL.iter().map(|k| k.as_str()).collect();
        format!("Unknown config key: {key} (expected one of {})", known.join(", ")).into()
    })
}

/// Applies `set <key> <value...>` to `config` and returns the message to show.
pub fn apply_set(config: &mut Config, key: &str, value: &[String]) -> Result<String, Box<dyn Error>> {
    let key = parse_key(key)?;
    let joined = value.join(" ");
    config.set_value(key, &joined)?;

    let mut message = format!("Set {key} to: {joined}");
    if key == ConfigKey::Model && find_builtin_model(&joined).is_none() {
        message.push_str(" (not a built-in model, it will be sent as a raw model id)");
    }
    Ok(message)
}

pub fn apply_unset(config: &mut Config, key: &str) -> Result<String, Box<dyn Error>> {
    let key = parse_key(key)?;
    config.unset_value(key);
    Ok(format!("Unset {key}"))
}

fn config_from_params(params: &GenerationParameters) -> Config {
    Config {
        model: Some(params.model_id.clone()),
        system_prompt: Some(params.system_message.clone()),
        max_tokens: Some(params.max_tokens),
        temperature: Some(params.temperature),
        top_p: Some(params.top_p),
        top_k: Some(params.top_k),
        ..Default::default()
    }
}

/// Applies the REPL's `/set <key> <value>` to the running session. The
/// config file is left untouched and the history is kept.
pub fn apply_session_set(
    session: &mut ChatSession,
    key: &str,
    value: &str,
) -> Result<String, Box<dyn Error>> {
    let key = parse_key(key)?;
    if matches!(key, ConfigKey::Region | ConfigKey::Endpoint) {
        return Err(format!("{key} applies at startup only; use `bedrock-chat set {key}`").into());
    }

    let mut config = config_from_params(session.params());
    config.set_value(key, value)?;
    let params = config.generation_parameters(&ParameterOverrides::default())?;
    session.set_params(params)?;

    let mut message = match key {
        ConfigKey::Model => format!("Set {key} to: {}", session.params().model_id),
        _ => format!("Set {key} to: {}", config.display_value(key).unwrap_or_default()),
    };
    if key == ConfigKey::Model && find_builtin_model(value.trim()).is_none() {
        message.push_str(" (not a built-in model, it will be sent as a raw model id)");
    }
    Ok(message)
}
