//! Server-Sent Events adapter for generation sessions.
//!
//! Wire format:
//! - each chunk is one `data: {"text": ..., "finish_reason": ...}` event
//! - the terminal chunk is followed by `data: [DONE]`
//!
//! The session runs on a blocking task and pushes chunks through a bounded
//! channel. The SSE stream owns the [`SessionGuard`]; when the client
//! disconnects axum drops the stream, the guard cancels the session, and the
//! producer stops at its next chunk.

use std::convert::Infallible;

use axum::{
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::Stream;
use llama_engine::{Chunk, GenerationSession, ModelHandle, SessionOutcome};
use llama_runtime::{InferenceTimer, TracingTelemetry};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::session_manager::SessionGuard;

/// Sentinel event sent after the terminal chunk.
pub const DONE: &str = "[DONE]";

const CHANNEL_CAPACITY: usize = 32;

/// Run `session` against `handle` and stream its chunks as SSE.
pub fn stream_generation(
    handle: ModelHandle,
    session: GenerationSession,
    guard: SessionGuard,
) -> Response {
    let session_id = guard.session_id();
    let cancel = guard.cancellation_token();
    let (tx, rx) = mpsc::channel::<Chunk>(CHANNEL_CAPACITY);

    let producer = tokio::task::spawn_blocking(move || {
        let mut timer = inference_timer(&handle, session_id);
        match handle.tokenize(session.prompt()) {
            Ok(tokens) => timer.record_prompt_tokens(tokens.len()),
            Err(e) => tracing::debug!(
                session = %session_id,
                error = %e,
                "prompt tokenization for telemetry failed"
            ),
        }

        let outcome = session.stream(handle.engine(), |chunk| {
            if cancel.is_cancelled() {
                return false;
            }
            timer.mark_chunk();
            tx.blocking_send(chunk).is_ok()
        });
        timer.finish();
        outcome
    });

    let events = chunk_events(rx, producer, guard);
    (
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

/// Timer reporting a generation's metrics through `tracing`.
pub(crate) fn inference_timer(handle: &ModelHandle, session_id: Uuid) -> InferenceTimer {
    InferenceTimer::new(
        handle.backend(),
        Box::new(TracingTelemetry::new(session_id.to_string())),
    )
}

/// Turn the producer's chunks into SSE events, closing with [`DONE`] after the
/// terminal chunk. Holds `guard` until the stream ends or is dropped.
fn chunk_events(
    mut rx: mpsc::Receiver<Chunk>,
    producer: JoinHandle<llama_engine::Result<SessionOutcome>>,
    guard: SessionGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let session_id = guard.session_id();
        let _guard = guard;

        while let Some(chunk) = rx.recv().await {
            let terminal = chunk.is_terminal();
            match Event::default().json_data(&chunk) {
                Ok(event) => {
                    yield Ok::<Event, Infallible>(event);
                }
                Err(e) => {
                    tracing::error!(session = %session_id, error = %e, "failed to encode chunk");
                    break;
                }
            }
            if terminal {
                yield Ok(Event::default().data(DONE));
                break;
            }
        }

        match producer.await {
            Ok(Ok(outcome)) => tracing::debug!(
                session = %session_id,
                finish_reason = ?outcome.finish_reason,
                completion_tokens = outcome.completion_tokens,
                "stream finished"
            ),
            Ok(Err(e)) => tracing::error!(session = %session_id, error = %e, "generation failed mid-stream"),
            Err(e) => tracing::error!(session = %session_id, error = %e, "generation task failed"),
        }
    }
}
