use anyhow::Context;
use lms_backend::{create_router, initialize_backend, BackendConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BackendConfig::load()?;
    let addr = config.socket_addr()?;

    let app_state = initialize_backend(config)?;
    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Starting server on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
