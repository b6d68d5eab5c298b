//! `/tokenize` request/response types.

use llama_engine::TokenId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct TokenizeRequest {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenizeResponse {
    pub tokens: Vec<TokenId>,
}
