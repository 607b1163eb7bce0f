use std::ops::RangeInclusive;

use crate::core::builtin_models::default_model;
use crate::core::error::ChatError;

pub const MAX_TOKENS_RANGE: RangeInclusive<u32> = 10..=4096;
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const TOP_P_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const TOP_K_RANGE: RangeInclusive<u32> = 0..=500;

pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_TOP_P: f32 = 1.0;
pub const DEFAULT_TOP_K: u32 = 250;
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an helpful, harmless, and honest AI assistant. \
Your goal is to provide informative and substantive responses to queries while avoiding potential harms.";

/// Decoding knobs plus model selection for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParameters {
    pub model_id: String,
    pub system_message: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            model_id: default_model().id,
            system_message: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl GenerationParameters {
    /// Returns the parameters unchanged when every knob is in range.
    pub fn validated(self) -> Result<Self, ChatError> {
        if self.model_id.trim().is_empty() {
            return Err(ChatError::InvalidParameters("model id is empty".to_string()));
        }
        check_range("max_tokens", self.max_tokens, &MAX_TOKENS_RANGE)?;
        check_range("temperature", self.temperature, &TEMPERATURE_RANGE)?;
        check_range("top_p", self.top_p, &TOP_P_RANGE)?;
        check_range("top_k", self.top_k, &TOP_K_RANGE)?;
        Ok(self)
    }

    pub fn summary(&self) -> String {
        format!(
            "model={} max_tokens={} temperature={} top_p={} top_k={}",
            self.model_id, self.max_tokens, self.temperature, self.top_p, self.top_k
        )
    }
}

fn check_range<T>(name: &str, value: T, range: &RangeInclusive<T>) -> Result<(), ChatError>
where
    T: PartialOrd + std::fmt::Display,
{
    // NaN fails `contains`, which is what we want.
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ChatError::InvalidParameters(format!(
            "{name}={value} is outside {}..={}",
            range.start(),
            range.end()
        )))
    }
}
