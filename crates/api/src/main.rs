use anyhow::Context;

use tourbook_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tourbook_observability::init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let addr = format!("0.0.0.0:{}", config.port);

    let app = tourbook_api::app::build_app(config);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    tracing::info!("shutdown signal received");
}
