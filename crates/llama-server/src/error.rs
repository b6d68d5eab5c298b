//! HTTP error handling and response mapping.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use llama_engine::{LlamaError, ParameterError};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Llama(#[from] LlamaError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("model not initialized")]
    NotReady,

    #[error("model already initialized")]
    AlreadyInitialized,

    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::InvalidRequest(rejection.body_text())
    }
}

impl From<ParameterError> for ServerError {
    fn from(e: ParameterError) -> Self {
        ServerError::InvalidRequest(e.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        } else {
            tracing::debug!(%status, error = %message, "request rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        assert_eq!(
            ServerError::InvalidRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::from(ParameterError::ZeroMaxTokens).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn engine_and_lifecycle_errors_map_to_500() {
        let tokenize = ServerError::from(LlamaError::Tokenization("bad vocab".into()));
        assert_eq!(tokenize.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(tokenize.to_string(), "tokenization failed: bad vocab");
        assert_eq!(ServerError::NotReady.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
