//! Telemetry hooks for generation performance measurement.
//!
//! Provides:
//! - [`InferenceMetrics`]: time to first chunk, chunks/sec, and a generation summary
//! - [`TelemetryHook`] trait: callback interface for real-time metric reporting
//! - [`InferenceTimer`]: records timestamps and computes metrics
//! - [`TracingTelemetry`]: reports through `tracing`, tagged with a session id

use std::time::Instant;

/// Aggregate metrics from one generation session.
#[derive(Debug, Clone)]
pub struct InferenceMetrics {
    /// Backend the model runs on.
    pub backend: String,
    /// Time to first chunk in milliseconds (prompt processing latency).
    pub ttft_ms: f64,
    /// Chunks produced per second after the first one.
    pub chunks_per_sec: f64,
    /// Number of prompt tokens.
    pub prompt_tokens: usize,
    /// Number of chunks produced.
    pub generated_chunks: usize,
    /// Total wall-clock time in milliseconds.
    pub total_time_ms: f64,
}

/// Callback trait for real-time inference telemetry.
///
/// All methods have default no-op implementations so hooks can be selective.
pub trait TelemetryHook: Send + Sync {
    /// Called when the first chunk is ready.
    fn on_first_chunk(&self, _ttft_ms: f64) {}

    /// Called after each chunk is produced.
    fn on_chunk(&self, _chunk_idx: usize, _elapsed_ms: f64) {}

    /// Called when generation finishes with the full metrics summary.
    fn on_generation_complete(&self, _metrics: &InferenceMetrics) {}
}

/// Emits the summary through `tracing`, tagged with a session id.
#[derive(Debug, Clone)]
pub struct TracingTelemetry {
    session_id: String,
}

impl TracingTelemetry {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}

impl TelemetryHook for TracingTelemetry {
    fn on_first_chunk(&self, ttft_ms: f64) {
        tracing::debug!(session = %self.session_id, ttft_ms, "first chunk ready");
    }

    fn on_generation_complete(&self, m: &InferenceMetrics) {
        tracing::info!(
            session = %self.session_id,
            backend = %m.backend,
            prompt_tokens = m.prompt_tokens,
            chunks = m.generated_chunks,
            ttft_ms = format_args!("{:.1}", m.ttft_ms),
            chunks_per_sec = format_args!("{:.1}", m.chunks_per_sec),
            total_ms = format_args!("{:.1}", m.total_time_ms),
            "generation complete"
        );
    }
}

/// Records timestamps during generation to compute [`InferenceMetrics`].
///
/// Usage:
/// 1. Call [`InferenceTimer::new`] when generation starts
/// 2. Call [`InferenceTimer::mark_chunk`] for each chunk; the first marks TTFT
/// 3. Call [`InferenceTimer::record_prompt_tokens`] once the prompt size is known
/// 4. Call [`InferenceTimer::finish`] to compute final metrics
pub struct InferenceTimer {
    backend: String,
    prompt_tokens: usize,
    start: Instant,
    first_chunk: Option<Instant>,
    chunk_count: usize,
    hook: Box<dyn TelemetryHook>,
}

impl InferenceTimer {
    pub fn new(backend: impl Into<String>, hook: Box<dyn TelemetryHook>) -> Self {
        Self {
            backend: backend.into(),
            prompt_tokens: 0,
            start: Instant::now(),
            first_chunk: None,
            chunk_count: 0,
            hook,
        }
    }

    pub fn record_prompt_tokens(&mut self, prompt_tokens: usize) {
        self.prompt_tokens = prompt_tokens;
    }

    /// Record one produced chunk. Fires `on_first_chunk` once, then `on_chunk`.
    pub fn mark_chunk(&mut self) {
        let now = Instant::now();
        if self.first_chunk.is_none() {
            self.first_chunk = Some(now);
            self.hook
                .on_first_chunk(now.duration_since(self.start).as_secs_f64() * 1000.0);
        }
        self.chunk_count += 1;
        let elapsed_ms = now.duration_since(self.start).as_secs_f64() * 1000.0;
        self.hook.on_chunk(self.chunk_count, elapsed_ms);
    }

    /// Finalize and return metrics. Fires `on_generation_complete`.
    pub fn finish(self) -> InferenceMetrics {
        let total_time_ms = self.start.elapsed().as_secs_f64() * 1000.0;

        let ttft_ms = self
            .first_chunk
            .map(|t| t.duration_since(self.start).as_secs_f64() * 1000.0)
            .unwrap_or(0.0);

        let decode_time_ms = total_time_ms - ttft_ms;
        let chunks_per_sec = if decode_time_ms > 0.0 && self.chunk_count > 1 {
            (self.chunk_count - 1) as f64 / (decode_time_ms / 1000.0)
        } else {
            0.0
        };

        let metrics = InferenceMetrics {
            backend: self.backend,
            ttft_ms,
            chunks_per_sec,
            prompt_tokens: self.prompt_tokens,
            generated_chunks: self.chunk_count,
            total_time_ms,
        };

        self.hook.on_generation_complete(&metrics);
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Keeps the last report so tests can inspect it.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Option<InferenceMetrics>>>);

    impl Capture {
        fn last(&self) -> Option<InferenceMetrics> {
            self.0.lock().unwrap().clone()
        }
    }

    impl TelemetryHook for Capture {
        fn on_generation_complete(&self, metrics: &InferenceMetrics) {
            *self.0.lock().unwrap() = Some(metrics.clone());
        }
    }

    #[test]
    fn inference_timer_fires_hooks() {
        let capture = Capture::default();

        let mut timer = InferenceTimer::new("cpu", Box::new(capture.clone()));
        timer.mark_chunk();
        timer.mark_chunk();
        timer.mark_chunk();
        timer.record_prompt_tokens(2);
        let metrics = timer.finish();

        assert_eq!(metrics.generated_chunks, 3);
        assert_eq!(metrics.prompt_tokens, 2);
        assert!(metrics.total_time_ms >= metrics.ttft_ms);

        let captured = capture.last().unwrap();
        assert_eq!(captured.generated_chunks, 3);
        assert_eq!(captured.backend, "cpu");
    }

    #[test]
    fn first_chunk_fires_once() {
        struct Counting(Arc<AtomicUsize>);
        impl TelemetryHook for Counting {
            fn on_first_chunk(&self, _ttft_ms: f64) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let mut timer = InferenceTimer::new("cpu", Box::new(Counting(count.clone())));
        timer.mark_chunk();
        timer.mark_chunk();
        timer.finish();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inference_timer_without_chunks() {
        let capture = Capture::default();
        let metrics = InferenceTimer::new("cpu", Box::new(capture.clone())).finish();
        assert_eq!(metrics.ttft_ms, 0.0);
        assert_eq!(metrics.generated_chunks, 0);
        assert_eq!(metrics.chunks_per_sec, 0.0);
        assert_eq!(metrics.prompt_tokens, 0);
        assert!(capture.last().is_some());
    }

    #[test]
    fn tracing_telemetry_is_a_hook() {
        let mut timer = InferenceTimer::new("cpu", Box::new(TracingTelemetry::new("abc")));
        timer.mark_chunk();
        assert_eq!(timer.finish().generated_chunks, 1);
    }
}
