//! `/health` response types.

use llama_engine::ModelHandle;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelInfo>,
    pub active_sessions: usize,
}

/// What was loaded, and where.
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub path: String,
    pub backend: String,
    pub context_size: u32,
}

impl From<&ModelHandle> for ModelInfo {
    fn from(handle: &ModelHandle) -> Self {
        Self {
            path: handle.path().display().to_string(),
            backend: handle.backend().to_string(),
            context_size: handle.spec().context_size,
        }
    }
}
