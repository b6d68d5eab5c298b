//! `/generate` request/response types.

use llama_engine::params::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TOP_P};
use llama_engine::{FinishReason, GenerationParameters, GenerationResult, Usage};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// Generation request. Every field but `prompt` is optional.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    pub prompt: Option<String>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
    #[serde(default)]
    pub stream: bool,
    pub timeout_seconds: Option<u64>,
}

impl GenerateRequest {
    /// Validate the request and fill in defaults.
    pub fn into_parts(
        self,
        default_timeout_seconds: u64,
    ) -> Result<(String, GenerationParameters), ServerError> {
        let prompt = self
            .prompt
            .ok_or_else(|| ServerError::InvalidRequest("prompt is required".to_string()))?;
        if prompt.is_empty() {
            return Err(ServerError::InvalidRequest("prompt must not be empty".to_string()));
        }

        let params = GenerationParameters {
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p: self.top_p.unwrap_or(DEFAULT_TOP_P),
            stop: self.stop.unwrap_or_default(),
            stream: self.stream,
            timeout_seconds: self.timeout_seconds.unwrap_or(default_timeout_seconds),
        };
        params.validate()?;
        Ok((prompt, params))
    }
}

/// Buffered generation response.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub text: String,
    pub usage: Usage,
    pub finish_reason: FinishReason,
}

impl From<GenerationResult> for GenerateResponse {
    fn from(result: GenerationResult) -> Self {
        Self {
            text: result.text,
            usage: result.usage,
            finish_reason: result.finish_reason,
        }
    }
}
