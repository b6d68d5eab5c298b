//! llama.cpp backend.
//!
//! # Architecture
//!
//! `llama-cpp-2` contexts hold raw pointers and are not `Send`, so the backend,
//! the model and every generation context live on one dedicated worker thread.
//! Callers talk to it over bounded channels:
//!
//! ```text
//! ┌──────────────┐    Command     ┌─────────────────────┐
//! │ request task │ ─────────────> │ llama-cpp-worker     │
//! │              │ <───────────── │ owns backend + model │
//! └──────────────┘  Result<Chunk> └─────────────────────┘
//! ```
//!
//! Generation requests queue behind each other on the command channel. Each
//! gets a fresh context, so requests never share KV state. Dropping the chunk
//! stream raises a stop flag that the worker checks before every token.

use std::fmt::Display;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;

use llama_engine::{
    Chunk, ChunkStream, FinishReason, GenerationParameters, LlamaEngine, LlamaError, ModelSpec,
    Result, TokenId,
};

use crate::utf8::Utf8Buffer;

const COMMAND_QUEUE: usize = 16;
const CHUNK_BUFFER: usize = 32;
/// Temperatures below this sample greedily.
const GREEDY_BELOW: f32 = 0.01;

enum Command {
    Tokenize {
        text: String,
        reply: Sender<Result<Vec<TokenId>>>,
    },
    Generate {
        prompt: String,
        params: GenerationParameters,
        chunks: Sender<Result<Chunk>>,
        stop: Arc<AtomicBool>,
    },
    Shutdown,
}

/// A GGUF model served by llama.cpp on a dedicated worker thread.
pub struct LlamaCppEngine {
    command_tx: Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LlamaCppEngine {
    /// Load the model described by `spec`. Blocks until the weights are in memory.
    pub fn load(spec: &ModelSpec) -> Result<Self> {
        spec.validate()?;

        let (command_tx, command_rx) = bounded::<Command>(COMMAND_QUEUE);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let worker_spec = spec.clone();

        let handle = thread::Builder::new()
            .name("llama-cpp-worker".into())
            .spawn(move || worker_main(worker_spec, command_rx, ready_tx))
            .map_err(|e| LlamaError::ModelLoad(format!("failed to spawn worker thread: {e}")))?;

        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(LlamaError::ModelLoad(
                "worker thread exited while loading".to_string(),
            ))
        });
        if let Err(e) = ready {
            let _ = handle.join();
            return Err(e);
        }

        Ok(Self {
            command_tx,
            worker: Mutex::new(Some(handle)),
        })
    }
}

impl LlamaEngine for LlamaCppEngine {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>> {
        let (reply, rx) = bounded(1);
        self.command_tx
            .send(Command::Tokenize {
                text: text.to_string(),
                reply,
            })
            .map_err(|_| LlamaError::Tokenization("worker thread stopped".to_string()))?;
        rx.recv()
            .map_err(|_| LlamaError::Tokenization("worker thread stopped".to_string()))?
    }

    fn generate(&self, prompt: &str, params: &GenerationParameters) -> Result<ChunkStream> {
        let (chunks_tx, chunks_rx) = bounded(CHUNK_BUFFER);
        let stop = Arc::new(AtomicBool::new(false));
        self.command_tx
            .send(Command::Generate {
                prompt: prompt.to_string(),
                params: params.clone(),
                chunks: chunks_tx,
                stop: Arc::clone(&stop),
            })
            .map_err(|_| LlamaError::Generation("worker thread stopped".to_string()))?;
        Ok(Box::new(WorkerChunks {
            rx: chunks_rx,
            stop,
        }))
    }
}

impl Drop for LlamaCppEngine {
    fn drop(&mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

/// Chunk stream fed by the worker thread.
struct WorkerChunks {
    rx: Receiver<Result<Chunk>>,
    stop: Arc<AtomicBool>,
}

impl Iterator for WorkerChunks {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

impl Drop for WorkerChunks {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Worker thread main loop. Owns the backend and the model.
fn worker_main(spec: ModelSpec, commands: Receiver<Command>, ready: Sender<Result<()>>) {
    let backend = match LlamaBackend::init() {
        Ok(backend) => backend,
        Err(e) => {
            let _ = ready.send(Err(load_error("failed to initialize llama.cpp backend", e)));
            return;
        }
    };

    let model_params = LlamaModelParams::default().with_n_gpu_layers(spec.gpu_layers);
    let model = match LlamaModel::load_from_file(&backend, &spec.path, &model_params) {
        Ok(model) => model,
        Err(e) => {
            let what = format!("failed to load model {}", spec.path.display());
            let _ = ready.send(Err(load_error(&what, e)));
            return;
        }
    };

    tracing::info!(
        path = %spec.path.display(),
        vocab = model.n_vocab(),
        ctx_train = model.n_ctx_train(),
        context_size = spec.context_size,
        threads = spec.threads,
        gpu_layers = spec.gpu_layers,
        "model loaded"
    );
    let _ = ready.send(Ok(()));

    for command in commands.iter() {
        match command {
            Command::Tokenize { text, reply } => {
                let _ = reply.send(tokenize(&model, &text));
            }
            Command::Generate {
                prompt,
                params,
                chunks,
                stop,
            } => {
                if stop.load(Ordering::Relaxed) {
                    tracing::debug!("generation abandoned before it started");
                    continue;
                }
                if let Err(e) = run_generation(&backend, &model, &spec, &prompt, &params, &chunks, &stop) {
                    tracing::error!(error = %e, "llama.cpp generation failed");
                    let _ = chunks.send(Err(e));
                }
            }
            Command::Shutdown => break,
        }
    }
    tracing::info!("llama.cpp worker shutting down");
}

fn tokenize(model: &LlamaModel, text: &str) -> Result<Vec<TokenId>> {
    model
        .str_to_token(text, AddBos::Always)
        .map(|tokens| tokens.into_iter().map(|t| t.0).collect())
        .map_err(|e| LlamaError::Tokenization(e.to_string()))
}

/// Run one generation on a fresh context, streaming one chunk per token.
fn run_generation(
    backend: &LlamaBackend,
    model: &LlamaModel,
    spec: &ModelSpec,
    prompt: &str,
    params: &GenerationParameters,
    chunks: &Sender<Result<Chunk>>,
    stop: &AtomicBool,
) -> Result<()> {
    let n_ctx = NonZeroU32::new(spec.context_size)
        .ok_or_else(|| LlamaError::Generation("context size must be positive".to_string()))?;
    let threads = i32::try_from(spec.threads).unwrap_or(i32::MAX);
    let ctx_params = LlamaContextParams::default()
        .with_n_ctx(Some(n_ctx))
        .with_n_batch(spec.context_size)
        .with_n_threads(threads)
        .with_n_threads_batch(threads);

    let mut ctx = model
        .new_context(backend, ctx_params)
        .map_err(|e| generation_error("failed to create context", e))?;

    let prompt_tokens = model
        .str_to_token(prompt, AddBos::Always)
        .map_err(|e| LlamaError::Tokenization(e.to_string()))?;
    if prompt_tokens.is_empty() {
        return Err(LlamaError::Generation("prompt produced no tokens".to_string()));
    }
    if prompt_tokens.len() >= spec.context_size as usize {
        return Err(LlamaError::Generation(format!(
            "prompt of {} tokens does not fit the {} token context",
            prompt_tokens.len(),
            spec.context_size
        )));
    }
    tracing::debug!(prompt_tokens = prompt_tokens.len(), "prompt tokenized");

    let mut batch = LlamaBatch::new(spec.context_size as usize, 1);
    let last = prompt_tokens.len() - 1;
    for (i, token) in prompt_tokens.iter().enumerate() {
        batch
            .add(*token, i as i32, &[0], i == last)
            .map_err(|e| generation_error("failed to add prompt token to batch", e))?;
    }
    ctx.decode(&mut batch)
        .map_err(|e| generation_error("failed to decode prompt", e))?;

    let mut sampler = if params.temperature < GREEDY_BELOW {
        LlamaSampler::greedy()
    } else {
        LlamaSampler::chain_simple([
            LlamaSampler::top_p(params.top_p, 1),
            LlamaSampler::temp(params.temperature),
            LlamaSampler::dist(rand_seed()),
        ])
    };

    let mut utf8 = Utf8Buffer::new();
    let mut n_cur = prompt_tokens.len() as i32;
    let context_limit = n_ctx.get() as i32;

    for generated in 1..=params.max_tokens {
        if stop.load(Ordering::Relaxed) {
            tracing::debug!(generated, "generation stopped by consumer");
            return Ok(());
        }

        let token = sampler.sample(&ctx, batch.n_tokens() - 1);
        sampler.accept(token);

        if model.is_eog_token(token) {
            let _ = chunks.send(Ok(Chunk::finished(utf8.finish(), FinishReason::Stop)));
            return Ok(());
        }

        let bytes = model
            .token_to_bytes(token, Special::Tokenize)
            .map_err(|e| generation_error("failed to convert token to bytes", e))?;
        let mut text = utf8.push(&bytes);

        let chunk = if generated == params.max_tokens || n_cur + 1 >= context_limit {
            text.push_str(&utf8.finish());
            Chunk::finished(text, FinishReason::Length)
        } else {
            Chunk::text(text)
        };
        let terminal = chunk.is_terminal();

        if chunks.send(Ok(chunk)).is_err() {
            tracing::debug!(generated, "chunk receiver dropped, stopping generation");
            return Ok(());
        }
        if terminal {
            return Ok(());
        }

        batch.clear();
        batch
            .add(token, n_cur, &[0], true)
            .map_err(|e| generation_error("failed to add token to batch", e))?;
        ctx.decode(&mut batch)
            .map_err(|e| generation_error("failed to decode", e))?;
        n_cur += 1;
    }

    Ok(())
}

fn load_error(what: &str, e: impl Display) -> LlamaError {
    LlamaError::ModelLoad(format!("{what}: {e}"))
}

fn generation_error(what: &str, e: impl Display) -> LlamaError {
    LlamaError::Generation(format!("{what}: {e}"))
}

/// Random sampler seed from system entropy.
fn rand_seed() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish() as u32
}
