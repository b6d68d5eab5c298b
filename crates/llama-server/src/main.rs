use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use llama_runtime::{load_model, BackendSelector};
use llama_server::{run_server, AppState, ModelGate, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::parse();
    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let selector = BackendSelector::from_config(Some(&config.backend), config.gpu_layers)?;
    let spec = config.model_spec();

    let gate = Arc::new(ModelGate::new());
    let handle = tokio::task::spawn_blocking(move || load_model(spec, &selector)).await??;
    gate.initialize(handle)?;

    let state = AppState::new(gate).with_default_timeout(config.timeout_seconds);
    run_server(state, &config.host, config.port).await
}
