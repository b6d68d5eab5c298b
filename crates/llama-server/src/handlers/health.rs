//! Health check handler.

use axum::{extract::State, Json};

use crate::models::{HealthResponse, ModelInfo};
use crate::state::AppState;

/// Report model and session status. Never touches the engine.
pub async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let model = state.gate.handle().map(ModelInfo::from);
    Json(HealthResponse {
        status: "healthy",
        model_loaded: model.is_some(),
        model,
        active_sessions: state.sessions.active_count(),
    })
}
