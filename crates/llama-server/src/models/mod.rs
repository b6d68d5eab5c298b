//! Request/response bodies.

pub mod generate;
pub mod health;
pub mod tokenize;

pub use generate::{GenerateRequest, GenerateResponse};
pub use health::{HealthResponse, ModelInfo};
pub use tokenize::{TokenizeRequest, TokenizeResponse};
