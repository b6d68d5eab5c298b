//! HTTP request handlers for API endpoints.

pub mod generate;
pub mod health;
pub mod tokenize;

pub use generate::handle_generate;
pub use health::handle_health;
pub use tokenize::handle_tokenize;
