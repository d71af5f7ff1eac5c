use std::sync::Arc;

use anyhow::Context;

use folio_infra::PipelineConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    folio_observability::init();

    let config = PipelineConfig::from_env().context("invalid configuration")?;
    let bind_addr =
        std::env::var("FOLIO_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

    let services = Arc::new(folio_api::app::services::build_services(config).await?);
    let workers = services.worker_pool().spawn(services.worker_config());

    let app = folio_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    workers.shutdown().await;
    Ok(())
}
