//! # llama-engine
//!
//! The "narrow waist" of the llama-server stack. Defines the core [`LlamaEngine`]
//! trait, the generation data model, and the [`GenerationSession`] that turns an
//! engine's raw chunk stream into a bounded, terminated sequence of [`Chunk`]s.
//! Backends (mock, llama.cpp) live in `llama-runtime`; the HTTP surface lives in
//! `llama-server`.
//!
//! ## Design Notes
//!
//! ### Interior Mutability
//! `LlamaEngine` methods take `&self` so a single loaded model can be shared
//! across concurrent requests behind an `Arc`. Backends that need mutable
//! native state (contexts, samplers) own it on their own thread or behind a lock.
//!
//! ### Chunk Pulls
//! [`LlamaEngine::generate`] returns a lazy iterator of `Result<Chunk>`. A failure
//! part way through generation is just an `Err` item; the session decides how it
//! is surfaced to the client.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod chunk;
pub mod params;
pub mod session;
pub mod stop;

pub use chunk::{Chunk, FinishReason, GenerationResult, Usage};
pub use params::{GenerationParameters, ParameterError};
pub use session::{GenerationSession, SessionOutcome};
pub use stop::StopMatcher;

pub type Result<T> = std::result::Result<T, LlamaError>;

/// Token ID type (i32 for FFI compat; logically non-negative).
pub type TokenId = i32;

/// Lazy, engine-ordered sequence of generated chunks.
pub type ChunkStream = Box<dyn Iterator<Item = Result<Chunk>> + Send>;

/// Top-level error type for all engine operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlamaError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("model loading failed: {0}")]
    ModelLoad(String),
    #[error("tokenization failed: {0}")]
    Tokenization(String),
    #[error("generation failed: {0}")]
    Generation(String),
}

/// Specification for loading a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    /// Path to the model weights (a GGUF file for the llama.cpp backend).
    pub path: PathBuf,
    /// Context window size in tokens.
    pub context_size: u32,
    /// Number of CPU threads used for inference.
    pub threads: u32,
    /// Number of layers to offload to the GPU (0 = CPU only).
    pub gpu_layers: u32,
}

impl ModelSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            context_size: 2048,
            threads: 4,
            gpu_layers: 0,
        }
    }

    pub fn with_context_size(mut self, context_size: u32) -> Self {
        self.context_size = context_size;
        self
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_gpu_layers(mut self, gpu_layers: u32) -> Self {
        self.gpu_layers = gpu_layers;
        self
    }

    /// Check the spec before handing it to a backend.
    ///
    /// A missing model file is a configuration problem, not a load failure.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(LlamaError::Config("model path is empty".to_string()));
        }
        if !self.path.is_file() {
            return Err(LlamaError::Config(format!(
                "model file not found at: {}",
                self.path.display()
            )));
        }
        if self.context_size == 0 {
            return Err(LlamaError::Config("context size must be positive".to_string()));
        }
        if self.threads == 0 {
            return Err(LlamaError::Config("thread count must be positive".to_string()));
        }
        Ok(())
    }
}

/// The core engine trait. Everything else plugs into this.
///
/// Implementations provide tokenization and incremental generation. Swap the
/// llama.cpp backend for a mock without changing the session or server code.
pub trait LlamaEngine: Send + Sync {
    /// Convert text into a sequence of token IDs.
    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>>;

    /// Start generating from `prompt`.
    ///
    /// The returned stream may end without ever reporting a finish reason;
    /// [`GenerationSession`] normalizes that. Dropping the stream should stop
    /// any further work on the engine side.
    fn generate(&self, prompt: &str, params: &GenerationParameters) -> Result<ChunkStream>;
}

/// Handle to the one loaded model.
///
/// Cheap to clone; every clone shares the same engine. Nothing on the handle
/// can change the engine's configuration after construction.
#[derive(Clone)]
pub struct ModelHandle {
    engine: Arc<dyn LlamaEngine>,
    spec: ModelSpec,
    backend: String,
}

impl ModelHandle {
    pub fn new(engine: Arc<dyn LlamaEngine>, spec: ModelSpec, backend: impl Into<String>) -> Self {
        Self {
            engine,
            spec,
            backend: backend.into(),
        }
    }

    pub fn tokenize(&self, text: &str) -> Result<Vec<TokenId>> {
        self.engine.tokenize(text)
    }

    pub fn generate(&self, prompt: &str, params: &GenerationParameters) -> Result<ChunkStream> {
        self.engine.generate(prompt, params)
    }

    pub fn engine(&self) -> &dyn LlamaEngine {
        self.engine.as_ref()
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Name of the compute backend the model was loaded on (e.g. `cpu`, `cuda`).
    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn path(&self) -> &Path {
        &self.spec.path
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("spec", &self.spec)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}
