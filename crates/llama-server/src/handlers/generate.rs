//! Generation handler.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use llama_engine::GenerationSession;

use crate::error::ServerError;
use crate::models::{GenerateRequest, GenerateResponse};
use crate::state::AppState;
use crate::streaming;

/// Handle generation requests (buffered and streaming).
///
/// The request is validated before the model is looked up, so a bad request is
/// a 400 whether or not the model is ready. Each generation holds a session
/// guard; dropping it (client disconnect) cancels the generation.
pub async fn handle_generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(req) = payload?;
    let (prompt, params) = req.into_parts(state.default_timeout_seconds)?;
    let handle = state.gate.get()?.clone();

    let guard = state.sessions.open();
    let session_id = guard.session_id();
    tracing::info!(
        session = %session_id,
        stream = params.stream,
        max_tokens = params.max_tokens,
        timeout_seconds = params.timeout_seconds,
        "generate request"
    );

    let session = GenerationSession::new(prompt, params);
    if session.params().stream {
        return Ok(streaming::stream_generation(handle, session, guard));
    }

    let cancel = guard.cancellation_token();
    let result = tokio::task::spawn_blocking(move || {
        let mut timer = streaming::inference_timer(&handle, session_id);
        let result = session.complete_with(handle.engine(), |_| {
            if cancel.is_cancelled() {
                return false;
            }
            timer.mark_chunk();
            true
        });
        if let Ok(result) = &result {
            timer.record_prompt_tokens(result.usage.prompt_tokens);
        }
        timer.finish();
        result
    })
    .await?;
    drop(guard);

    match result {
        Ok(result) => {
            tracing::info!(
                session = %session_id,
                finish_reason = %result.finish_reason,
                prompt_tokens = result.usage.prompt_tokens,
                completion_tokens = result.usage.completion_tokens,
                "generation complete"
            );
            Ok(Json(GenerateResponse::from(result)).into_response())
        }
        Err(e) => {
            tracing::error!(session = %session_id, error = %e, "generation failed");
            Err(e.into())
        }
    }
}
