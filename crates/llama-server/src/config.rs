//! Process configuration, read once at startup.
//!
//! Every option is a command-line flag with an environment variable fallback.

use std::path::PathBuf;

use clap::Parser;
use llama_engine::params::DEFAULT_TIMEOUT_SECONDS;
use llama_engine::ModelSpec;

#[derive(Debug, Clone, Parser)]
#[command(name = "llama-server", version, about = "Serve a local GGUF model over HTTP")]
pub struct ServerConfig {
    /// Model file. Defaults to `<models-dir>/<model-name>.gguf`.
    #[arg(long, env = "LLM_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    #[arg(long, env = "MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    #[arg(long, env = "MODEL_NAME", default_value = "DeepSeek-R1-Distill-Qwen")]
    pub model_name: String,

    /// Context window in tokens.
    #[arg(long, env = "LLM_CONTEXT_LENGTH", default_value_t = 2048)]
    pub context_length: u32,

    #[arg(long, env = "LLM_THREADS", default_value_t = 4)]
    pub threads: u32,

    /// Layers to offload to the GPU. Defaults to all layers on a GPU backend, 0 on CPU.
    #[arg(long, env = "LLM_GPU_LAYERS")]
    pub gpu_layers: Option<u32>,

    /// Compute backend: auto, cpu, cuda, vulkan or metal.
    #[arg(long, env = "LLM_BACKEND", default_value = "auto")]
    pub backend: String,

    /// Wall-clock budget for requests that do not set `timeout_seconds`.
    #[arg(long, env = "LLM_TIMEOUT_SECONDS", default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout_seconds: u64,

    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,
}

impl ServerConfig {
    pub fn resolved_model_path(&self) -> PathBuf {
        match &self.model_path {
            Some(path) => path.clone(),
            None => self.models_dir.join(format!("{}.gguf", self.model_name)),
        }
    }

    /// Model spec before backend selection fills in the GPU layers.
    pub fn model_spec(&self) -> ModelSpec {
        ModelSpec::new(self.resolved_model_path())
            .with_context_size(self.context_length)
            .with_threads(self.threads)
    }
}
