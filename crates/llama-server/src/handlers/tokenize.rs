//! Tokenize handler.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::error::ServerError;
use crate::models::{TokenizeRequest, TokenizeResponse};
use crate::state::AppState;

/// Tokenize `text` with the loaded model. Empty text is allowed.
pub async fn handle_tokenize(
    State(state): State<AppState>,
    payload: Result<Json<TokenizeRequest>, JsonRejection>,
) -> Result<Json<TokenizeResponse>, ServerError> {
    let Json(req) = payload?;
    let text = req
        .text
        .ok_or_else(|| ServerError::InvalidRequest("text is required".to_string()))?;
    let handle = state.gate.get()?.clone();

    let tokens = tokio::task::spawn_blocking(move || handle.tokenize(&text)).await??;
    Ok(Json(TokenizeResponse { tokens }))
}
