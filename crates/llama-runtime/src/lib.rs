//! # llama-runtime
//!
//! Engine backends and the plumbing around them: compute backend selection,
//! model loading, and telemetry hooks (TTFT, chunks/sec).
//!
//! With the `llama-cpp` feature, [`load_model`] serves GGUF models through
//! llama.cpp. Without it, the same call validates the model file and serves
//! the deterministic [`MockEngine`], which keeps the HTTP surface testable on
//! machines without a native toolchain.

use std::sync::Arc;

use llama_engine::{LlamaEngine, ModelHandle, ModelSpec, Result};

pub mod backend;
#[cfg(feature = "llama-cpp")]
pub mod llama_cpp;
pub mod mock;
pub mod telemetry;
pub mod utf8;

pub use backend::{Backend, BackendError, BackendSelector};
#[cfg(feature = "llama-cpp")]
pub use llama_cpp::LlamaCppEngine;
pub use mock::{MockEngine, MockStep};
pub use telemetry::{InferenceMetrics, InferenceTimer, TelemetryHook, TracingTelemetry};

/// Load the model described by `spec` on the backend chosen by `selector`.
///
/// The selector's GPU layer count replaces the one in `spec`. Blocks until
/// the model is ready; errors are `Config` (bad spec, missing file) or
/// `ModelLoad` (the backend rejected the weights).
pub fn load_model(spec: ModelSpec, selector: &BackendSelector) -> Result<ModelHandle> {
    let spec = spec.with_gpu_layers(selector.gpu_layers());
    spec.validate()?;

    tracing::info!(
        path = %spec.path.display(),
        backend = %selector.active(),
        context_size = spec.context_size,
        threads = spec.threads,
        gpu_layers = spec.gpu_layers,
        "loading model"
    );

    let engine = load_engine(&spec)?;
    Ok(ModelHandle::new(engine, spec, selector.active().as_str()))
}

#[cfg(feature = "llama-cpp")]
fn load_engine(spec: &ModelSpec) -> Result<Arc<dyn LlamaEngine>> {
    Ok(Arc::new(LlamaCppEngine::load(spec)?))
}

#[cfg(not(feature = "llama-cpp"))]
fn load_engine(spec: &ModelSpec) -> Result<Arc<dyn LlamaEngine>> {
    tracing::warn!("built without the `llama-cpp` feature; generation is simulated");
    Ok(Arc::new(MockEngine::load(spec)?))
}
