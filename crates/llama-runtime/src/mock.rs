//! Deterministic in-process engine.
//!
//! [`MockEngine`] needs no model weights. By default it tokenizes on
//! whitespace and "generates" by echoing the prompt one word per chunk,
//! followed by an end-of-generation chunk. A script can replace the echo to
//! reproduce specific engine behaviour (slow chunks, mid-stream failures,
//! streams that end without a finish reason).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use llama_engine::{
    Chunk, ChunkStream, FinishReason, GenerationParameters, LlamaEngine, LlamaError, ModelSpec,
    Result, TokenId,
};

const VOCAB_SIZE: u32 = 32_000;

/// One scripted engine event.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// An incremental chunk.
    Text(String),
    /// A chunk carrying the engine's own finish reason.
    Finish(String, FinishReason),
    /// A mid-stream engine failure.
    Fail(String),
    /// Block the producing thread before the next step.
    Delay(Duration),
}

impl MockStep {
    pub fn text(text: impl Into<String>) -> Self {
        MockStep::Text(text.into())
    }
}

#[derive(Debug, Default)]
struct Counters {
    tokenize: AtomicUsize,
    generate: AtomicUsize,
    pulled: AtomicUsize,
}

/// Engine used for tests and for builds without llama.cpp.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    script: Option<Vec<MockStep>>,
    tokenize_error: Option<String>,
    counters: Arc<Counters>,
}

impl MockEngine {
    /// Echo engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that replays `steps` for every generation, ignoring the prompt.
    pub fn scripted(steps: Vec<MockStep>) -> Self {
        Self {
            script: Some(steps),
            ..Self::default()
        }
    }

    /// Stand in for a model loaded from `spec`.
    ///
    /// `spec` is validated exactly as a real backend would, so a missing
    /// model file still fails startup.
    pub fn load(spec: &ModelSpec) -> Result<Self> {
        spec.validate()?;
        tracing::info!(path = %spec.path.display(), "mock engine standing in for model");
        Ok(Self::new())
    }

    /// Make every `tokenize` call fail with `message`.
    pub fn with_tokenize_error(mut self, message: impl Into<String>) -> Self {
        self.tokenize_error = Some(message.into());
        self
    }

    pub fn tokenize_calls(&self) -> usize {
        self.counters.tokenize.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.counters.generate.load(Ordering::SeqCst)
    }

    /// Total items pulled from all chunk streams so far.
    pub fn chunks_pulled(&self) -> usize {
        self.counters.pulled.load(Ordering::SeqCst)
    }

    fn echo_steps(prompt: &str, max_tokens: usize) -> Vec<MockStep> {
        let mut steps: Vec<MockStep> = prompt
            .split_whitespace()
            .enumerate()
            .take(max_tokens)
            .map(|(i, word)| {
                if i == 0 {
                    MockStep::text(word)
                } else {
                    MockStep::Text(format!(" {word}"))
                }
            })
            .collect();
        if steps.len() < max_tokens {
            steps.push(MockStep::Finish(String::new(), FinishReason::Stop));
        }
        steps
    }
}

impl LlamaEngine for MockEngine {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>> {
        self.counters.tokenize.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.tokenize_error {
            return Err(LlamaError::Tokenization(message.clone()));
        }
        Ok(text.split_whitespace().map(word_id).collect())
    }

    fn generate(&self, prompt: &str, params: &GenerationParameters) -> Result<ChunkStream> {
        self.counters.generate.fetch_add(1, Ordering::SeqCst);
        let steps = match &self.script {
            Some(script) => script.clone(),
            None => Self::echo_steps(prompt, params.max_tokens),
        };
        Ok(Box::new(MockChunks {
            steps: steps.into_iter(),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct MockChunks {
    steps: std::vec::IntoIter<MockStep>,
    counters: Arc<Counters>,
}

impl Iterator for MockChunks {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = self.steps.next()?;
            self.counters.pulled.fetch_add(1, Ordering::SeqCst);
            match step {
                MockStep::Delay(d) => std::thread::sleep(d),
                MockStep::Text(text) => return Some(Ok(Chunk::text(text))),
                MockStep::Finish(text, reason) => return Some(Ok(Chunk::finished(text, reason))),
                MockStep::Fail(message) => return Some(Err(LlamaError::Generation(message))),
            }
        }
    }
}

/// FNV-1a over the word bytes, folded into the vocabulary.
fn word_id(word: &str) -> TokenId {
    let hash = word
        .bytes()
        .fold(0x811c_9dc5u32, |h, b| (h ^ b as u32).wrapping_mul(0x0100_0193));
    (hash % VOCAB_SIZE) as TokenId
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(engine: &MockEngine, prompt: &str, max_tokens: usize) -> Vec<Chunk> {
        let params = GenerationParameters {
            max_tokens,
            ..Default::default()
        };
        engine
            .generate(prompt, &params)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn echo_repeats_prompt_words() {
        let chunks = drain(&MockEngine::new(), "Hello there world", 16);
        let text: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(text, "Hello there world");
        assert_eq!(chunks.last().unwrap().finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn echo_stops_at_max_tokens_without_reason() {
        let chunks = drain(&MockEngine::new(), "a b c d e", 2);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.finish_reason.is_none()));
    }

    #[test]
    fn tokenize_is_deterministic() {
        let engine = MockEngine::new();
        let a = engine.tokenize("the quick brown fox").unwrap();
        let b = engine.tokenize("the quick brown fox").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert!(a.iter().all(|&t| (0..VOCAB_SIZE as i32).contains(&t)));
        assert_eq!(engine.tokenize_calls(), 2);
    }

    #[test]
    fn tokenize_empty_text() {
        assert!(MockEngine::new().tokenize("").unwrap().is_empty());
    }

    #[test]
    fn tokenize_error_is_reported() {
        let engine = MockEngine::new().with_tokenize_error("vocab missing");
        assert!(matches!(engine.tokenize("x"), Err(LlamaError::Tokenization(_))));
    }

    #[test]
    fn scripted_steps_replay_in_order() {
        let engine = MockEngine::scripted(vec![
            MockStep::text("a"),
            MockStep::Delay(Duration::from_millis(1)),
            MockStep::Fail("boom".to_string()),
        ]);
        let mut stream = engine
            .generate("ignored", &GenerationParameters::default())
            .unwrap();
        assert_eq!(stream.next().unwrap().unwrap(), Chunk::text("a"));
        assert!(matches!(stream.next(), Some(Err(LlamaError::Generation(_)))));
        assert!(stream.next().is_none());
        assert_eq!(engine.generate_calls(), 1);
        assert_eq!(engine.chunks_pulled(), 3);
    }

    #[test]
    fn load_rejects_missing_file() {
        let err = MockEngine::load(&ModelSpec::new("/nope/model.gguf")).unwrap_err();
        assert!(matches!(err, LlamaError::Config(_)));
    }
}
