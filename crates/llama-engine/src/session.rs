//! Generation sessions.
//!
//! A [`GenerationSession`] is the bounded lifetime of one generation request. It
//! pulls chunks from a [`LlamaEngine`] and guarantees the sequence it hands on:
//!
//! - is never empty and ends with exactly one chunk carrying a finish reason
//! - stops with [`FinishReason::Timeout`] once the wall-clock budget is spent
//! - stops with [`FinishReason::Stop`] at the first stop sequence, which is never emitted
//! - stops with [`FinishReason::Length`] after `max_tokens` engine chunks, or when
//!   the engine runs dry without saying why
//! - turns an engine failure into a terminal [`FinishReason::Error`] chunk and then
//!   returns the error so the caller can record it
//!
//! Chunks are passed to a sink closure in generation order. The sink returns
//! `false` once its consumer is gone; the session then stops pulling from the
//! engine and drops the engine stream.

use std::time::{Duration, Instant};

use crate::chunk::{Chunk, FinishReason, GenerationResult, Usage};
use crate::params::GenerationParameters;
use crate::stop::StopMatcher;
use crate::{LlamaEngine, LlamaError, Result};

/// How a streamed session ended.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    /// Reason carried by the terminal chunk, or `None` if the consumer went
    /// away before the terminal chunk was delivered.
    pub finish_reason: Option<FinishReason>,
    /// Engine chunks consumed (one per generated token).
    pub completion_tokens: usize,
    /// Chunks handed to the sink, including the terminal one.
    pub chunks_emitted: usize,
    pub elapsed: Duration,
}

impl SessionOutcome {
    pub fn is_cancelled(&self) -> bool {
        self.finish_reason.is_none()
    }
}

/// One (prompt, parameters) pair on its way to becoming a chunk sequence.
#[derive(Debug, Clone)]
pub struct GenerationSession {
    prompt: String,
    params: GenerationParameters,
    timeout: Duration,
}

impl GenerationSession {
    pub fn new(prompt: impl Into<String>, params: GenerationParameters) -> Self {
        let timeout = params.timeout();
        Self {
            prompt: prompt.into(),
            params,
            timeout,
        }
    }

    /// Override the wall-clock budget derived from `timeout_seconds`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn params(&self) -> &GenerationParameters {
        &self.params
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the session, handing every chunk to `emit`.
    ///
    /// Returns `Err` only for engine failures, and only after the terminal
    /// error chunk has been offered to the sink.
    pub fn stream<F>(&self, engine: &dyn LlamaEngine, emit: F) -> Result<SessionOutcome>
    where
        F: FnMut(Chunk) -> bool,
    {
        let start = Instant::now();
        let mut sink = Sink {
            emit,
            emitted: 0,
            open: true,
        };

        let mut chunks = match engine.generate(&self.prompt, &self.params) {
            Ok(chunks) => chunks,
            Err(e) => {
                sink.send(error_chunk(&e));
                return Err(e);
            }
        };

        let mut stop = StopMatcher::new(&self.params.stop);
        let mut consumed = 0usize;

        let reason = loop {
            let pulled = match chunks.next() {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    sink.send(error_chunk(&e));
                    return Err(e);
                }
                None => {
                    if start.elapsed() > self.timeout {
                        break Some(self.time_out(&mut sink, consumed));
                    }
                    let held = stop.flush();
                    if !held.is_empty() && !sink.send(Chunk::text(held)) {
                        break None;
                    }
                    tracing::debug!(consumed, "engine ended without a finish reason");
                    sink.send(Chunk::finished("", FinishReason::Length));
                    break Some(FinishReason::Length);
                }
            };

            if start.elapsed() > self.timeout {
                break Some(self.time_out(&mut sink, consumed));
            }

            consumed += 1;
            let scan = stop.push(&pulled.text);
            if scan.matched {
                sink.send(Chunk::finished(scan.text, FinishReason::Stop));
                break Some(FinishReason::Stop);
            }

            let finish = pulled
                .finish_reason
                .or_else(|| (consumed >= self.params.max_tokens).then_some(FinishReason::Length));

            match finish {
                Some(reason) => {
                    let mut text = scan.text;
                    text.push_str(&stop.flush());
                    sink.send(Chunk::finished(text, reason));
                    break Some(reason);
                }
                None => {
                    if !scan.text.is_empty() && !sink.send(Chunk::text(scan.text)) {
                        break None;
                    }
                }
            }
        };
        drop(chunks);

        let finish_reason = reason.filter(|_| sink.open);
        if finish_reason.is_none() {
            tracing::debug!(consumed, "consumer went away, generation abandoned");
        }

        Ok(SessionOutcome {
            finish_reason,
            completion_tokens: consumed,
            chunks_emitted: sink.emitted,
            elapsed: start.elapsed(),
        })
    }

    /// Run the session to completion and collect a single result.
    ///
    /// Engine failures are returned as errors with no partial output. A timeout
    /// keeps the text generated so far and reports [`FinishReason::Timeout`].
    pub fn complete(&self, engine: &dyn LlamaEngine) -> Result<GenerationResult> {
        self.complete_with(engine, |_| true)
    }

    /// Like [`complete`](Self::complete), but shows every chunk to `observe`
    /// first. The generation is abandoned as soon as `observe` returns false.
    pub fn complete_with<F>(&self, engine: &dyn LlamaEngine, mut observe: F) -> Result<GenerationResult>
    where
        F: FnMut(&Chunk) -> bool,
    {
        let prompt_tokens = engine.tokenize(&self.prompt)?.len();

        let mut text = String::new();
        let outcome = self.stream(engine, |chunk| {
            if !observe(&chunk) {
                return false;
            }
            if chunk.finish_reason != Some(FinishReason::Timeout) {
                text.push_str(&chunk.text);
            }
            true
        })?;

        let finish_reason = outcome
            .finish_reason
            .ok_or_else(|| LlamaError::Generation("generation cancelled".to_string()))?;

        Ok(GenerationResult {
            text,
            usage: Usage::new(prompt_tokens, outcome.completion_tokens),
            finish_reason,
        })
    }

    fn time_out<F>(&self, sink: &mut Sink<F>, consumed: usize) -> FinishReason
    where
        F: FnMut(Chunk) -> bool,
    {
        tracing::warn!(timeout = ?self.timeout, consumed, "generation timed out");
        let notice = format!("generation timed out after {:?}", self.timeout);
        sink.send(Chunk::finished(notice, FinishReason::Timeout));
        FinishReason::Timeout
    }
}

fn error_chunk(e: &LlamaError) -> Chunk {
    Chunk::finished(format!("[error] {e}"), FinishReason::Error)
}

/// Tracks whether the consumer is still there.
struct Sink<F> {
    emit: F,
    emitted: usize,
    open: bool,
}

impl<F> Sink<F>
where
    F: FnMut(Chunk) -> bool,
{
    fn send(&mut self, chunk: Chunk) -> bool {
        if !self.open {
            return false;
        }
        self.open = (self.emit)(chunk);
        if self.open {
            self.emitted += 1;
        }
        self.open
    }
}
