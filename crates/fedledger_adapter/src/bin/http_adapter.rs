#![forbid(unsafe_code)]

use std::sync::Arc;

use fedledger_adapter::{router, AdapterConfig, AdapterRuntime};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AdapterConfig::default_from_env()?;
    let runtime = AdapterRuntime::from_config(&config)?;
    let health = runtime.health_report();
    let app = router(Arc::new(runtime));

    info!(
        bind = %config.bind,
        backend = health.backend.as_str(),
        ledger = health.ledger.as_str(),
        documents = health.documents.as_str(),
        oracle = health.oracle.as_str(),
        "fedledger_adapter_http listening"
    );
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
