use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::builtin_models::{default_model, resolve_model_id};
use crate::core::error::ChatError;
use crate::core::params::{
    GenerationParameters, DEFAULT_MAX_TOKENS, DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_K, DEFAULT_TOP_P,
};

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Built-in display name, built-in id or raw Bedrock model id
    pub model: Option<String>,
    /// AWS region for the Bedrock runtime (e.g., "us-east-1")
    pub region: Option<String>,
    /// HTTP gateway to use instead of the Bedrock SDK
    pub endpoint: Option<String>,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

/// Values given on the command line; each one wins over the config file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParameterOverrides {
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

/// Keys accepted by `set` and `unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Model,
    Region,
    Endpoint,
    SystemPrompt,
    MaxTokens,
    Temperature,
    TopP,
    TopK,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 8] = [
        ConfigKey::Model,
        ConfigKey::Region,
        ConfigKey::Endpoint,
        ConfigKey::SystemPrompt,
        ConfigKey::MaxTokens,
        ConfigKey::Temperature,
        ConfigKey::TopP,
        ConfigKey::TopK,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::Model => "model",
            ConfigKey::Region => "region",
            ConfigKey::Endpoint => "endpoint",
            ConfigKey::SystemPrompt => "system-prompt",
            ConfigKey::MaxTokens => "max-tokens",
            ConfigKey::Temperature => "temperature",
            ConfigKey::TopP => "top-p",
            ConfigKey::TopK => "top-k",
        }
    }

    /// Accepts both `top-p` and `top_p` spellings.
    pub fn parse(key: &str) -> Option<Self> {
        let normalized = key.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|k| k.as_str() == normalized)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

fn parse_number<T: std::str::FromStr>(key: ConfigKey, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| format!("{key} expects a number, got '{value}'"))
}

impl Config {
    /// The model id a session would use, after resolving display names.
    pub fn model_id(&self, overrides: &ParameterOverrides) -> String {
        overrides
            .model
            .as_deref()
            .or(self.model.as_deref())
            .map(resolve_model_id)
            .unwrap_or_else(|| default_model().id)
    }

    /// Merges file values, `overrides` and the built-in defaults, then
    /// checks every knob against its allowed range.
    pub fn generation_parameters(
        &self,
        overrides: &ParameterOverrides,
    ) -> Result<GenerationParameters, ChatError> {
        GenerationParameters {
            model_id: self.model_id(overrides),
            system_message: overrides
                .system_prompt
                .clone()
                .or_else(|| self.system_prompt.clone())
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_tokens: overrides
                .max_tokens
                .or(self.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: overrides
                .temperature
                .or(self.temperature)
                .unwrap_or(DEFAULT_TEMPERATURE),
            top_p: overrides.top_p.or(self.top_p).unwrap_or(DEFAULT_TOP_P),
            top_k: overrides.top_k.or(self.top_k).unwrap_or(DEFAULT_TOP_K),
        }
        .validated()
    }

    /// Stores `value` under `key`. Numeric keys are parsed but not range
    /// checked here; out-of-range values are reported when a session starts.
    pub fn set_value(&mut self, key: ConfigKey, value: &str) -> Result<(), String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(format!("{key} needs a value"));
        }
        match key {
            ConfigKey::Model => self.model = Some(trimmed.to_string()),
            ConfigKey::Region => self.region = Some(trimmed.to_string()),
            ConfigKey::Endpoint => self.endpoint = Some(trimmed.to_string()),
            ConfigKey::SystemPrompt => self.system_prompt = Some(value.to_string()),
            ConfigKey::MaxTokens => self.max_tokens = Some(parse_number(key, trimmed)?),
            ConfigKey::Temperature => self.temperature = Some(parse_number(key, trimmed)?),
            ConfigKey::TopP => self.top_p = Some(parse_number(key, trimmed)?),
            ConfigKey::TopK => self.top_k = Some(parse_number(key, trimmed)?),
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::Model => self.model = None,
            ConfigKey::Region => self.region = None,
            ConfigKey::Endpoint => self.endpoint = None,
            ConfigKey::SystemPrompt => self.system_prompt = None,
            ConfigKey::MaxTokens => self.max_tokens = None,
            ConfigKey::Temperature => self.temperature = None,
            ConfigKey::TopP => self.top_p = None,
            ConfigKey::TopK => self.top_k = None,
        }
    }

    /// Current value of `key` rendered for display.
    pub fn display_value(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::Model => self.model.clone(),
            ConfigKey::Region => self.region.clone(),
            ConfigKey::Endpoint => self.endpoint.clone(),
            ConfigKey::SystemPrompt => self.system_prompt.clone(),
            ConfigKey::MaxTokens => self.max_tokens.map(|v| v.to_string()),
            ConfigKey::Temperature => self.temperature.map(|v| v.to_string()),
            ConfigKey::TopP => self.top_p.map(|v| v.to_string()),
            ConfigKey::TopK => self.top_k.map(|v| v.to_string()),
        }
    }
}
