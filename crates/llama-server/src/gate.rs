//! Initialization gate for the process-wide model.
//!
//! Uninitialized → Ready, exactly once. Nothing can observe a partially built
//! handle, and nothing can replace the handle once it is set.

use std::sync::OnceLock;

use llama_engine::ModelHandle;

use crate::error::ServerError;

#[derive(Debug, Default)]
pub struct ModelGate {
    handle: OnceLock<ModelHandle>,
}

impl ModelGate {
    /// An uninitialized gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// A gate that is already ready.
    pub fn with_handle(handle: ModelHandle) -> Self {
        Self {
            handle: OnceLock::from(handle),
        }
    }

    /// Publish the loaded model. A second call is rejected.
    pub fn initialize(&self, handle: ModelHandle) -> Result<(), ServerError> {
        self.handle
            .set(handle)
            .map_err(|_| ServerError::AlreadyInitialized)?;
        tracing::info!("model ready");
        Ok(())
    }

    /// The model, or [`ServerError::NotReady`] before initialization.
    pub fn get(&self) -> Result<&ModelHandle, ServerError> {
        self.handle.get().ok_or(ServerError::NotReady)
    }

    pub fn handle(&self) -> Option<&ModelHandle> {
        self.handle.get()
    }

    pub fn is_ready(&self) -> bool {
        self.handle.get().is_some()
    }
}
