//! Generation parameters and their policy defaults.

use std::time::Duration;

pub const DEFAULT_MAX_TOKENS: usize = 4096;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TOP_P: f32 = 0.95;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

/// An out-of-range generation parameter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error("max_tokens must be positive")]
    ZeroMaxTokens,
    #[error("temperature must be a finite number >= 0 (got {0})")]
    InvalidTemperature(f32),
    #[error("top_p must be within [0, 1] (got {0})")]
    InvalidTopP(f32),
    #[error("timeout_seconds must be positive")]
    ZeroTimeout,
    #[error("stop sequences must not be empty strings")]
    EmptyStopSequence,
}

/// Parameters for one generation session. Immutable once the session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParameters {
    /// Upper bound on generated tokens.
    pub max_tokens: usize,
    /// Sampling temperature (0.0 = greedy).
    pub temperature: f32,
    /// Nucleus sampling threshold.
    pub top_p: f32,
    /// Stop sequences, checked in order.
    pub stop: Vec<String>,
    /// Stream chunks incrementally instead of returning one result.
    pub stream: bool,
    /// Wall-clock budget for the whole session.
    pub timeout_seconds: u64,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            stop: Vec::new(),
            stream: false,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl GenerationParameters {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.max_tokens == 0 {
            return Err(ParameterError::ZeroMaxTokens);
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(ParameterError::InvalidTemperature(self.temperature));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ParameterError::InvalidTopP(self.top_p));
        }
        if self.timeout_seconds == 0 {
            return Err(ParameterError::ZeroTimeout);
        }
        if self.stop.iter().any(|s| s.is_empty()) {
            return Err(ParameterError::EmptyStopSequence);
        }
        Ok(())
    }
}
