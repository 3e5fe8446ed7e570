use std::net::SocketAddr;

use tracing_subscriber::{fmt, EnvFilter};

use gatekeep_core::error::{GatekeepError, Result};
use gatekeep_engine::{app_state::AppState, config, policies::PolicyRegistry, router};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::var("GATEKEEP_CONFIG").unwrap_or_else(|_| "gatekeep.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .map_err(|e| GatekeepError::BadRequest(format!("server.listen must be a valid SocketAddr: {e}")))?;

    let registry = PolicyRegistry::with_builtins();
    let state = AppState::new(cfg, &registry)?;
    let app = router::build_router(state);

    tracing::info!(%listen, config=%path, "gatekeep starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| GatekeepError::Internal(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| GatekeepError::Internal(format!("server failed: {e}")))
}
