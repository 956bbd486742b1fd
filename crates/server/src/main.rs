use anyhow::Context;
use deployment::Deployment;
use server::{DeploymentImpl, router};
use tracing::info;
use utils::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("info,server=debug,services=debug,db=debug");

    let deployment = DeploymentImpl::new()
        .await
        .context("failed to initialize deployment")?;

    let addr = deployment.config().bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Site generator listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(deployment))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
