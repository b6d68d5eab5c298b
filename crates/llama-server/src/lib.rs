//! # llama-server
//!
//! HTTP surface for one locally loaded model.
//!
//! - `POST /generate`: buffered JSON completion, or Server-Sent Events when `stream` is set
//! - `POST /tokenize`: prompt token ids
//! - `GET /health`: liveness plus model and session status
//!
//! Every route is also served under `/api`. The model is reached through the
//! [`ModelGate`], so requests that arrive before it is loaded get a well-defined
//! "not ready" error instead of touching a half-built engine.

pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod server;
pub mod session_manager;
pub mod state;
pub mod streaming;

pub use config::ServerConfig;
pub use error::ServerError;
pub use gate::ModelGate;
pub use server::{create_router, run_server};
pub use session_manager::{SessionGuard, SessionManager};
pub use state::AppState;
