//! Application state shared across handlers.

use std::sync::Arc;

use llama_engine::params::DEFAULT_TIMEOUT_SECONDS;
use llama_engine::ModelHandle;

use crate::gate::ModelGate;
use crate::session_manager::SessionManager;

#[derive(Clone)]
pub struct AppState {
    /// The one model, once loaded.
    pub gate: Arc<ModelGate>,
    /// In-flight generation sessions.
    pub sessions: Arc<SessionManager>,
    /// Applied to requests that do not set `timeout_seconds`.
    pub default_timeout_seconds: u64,
}

impl AppState {
    pub fn new(gate: Arc<ModelGate>) -> Self {
        Self {
            gate,
            sessions: SessionManager::new(),
            default_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    /// State around an already loaded model.
    pub fn ready(handle: ModelHandle) -> Self {
        Self::new(Arc::new(ModelGate::with_handle(handle)))
    }

    pub fn with_default_timeout(mut self, seconds: u64) -> Self {
        self.default_timeout_seconds = seconds;
        self
    }
}
