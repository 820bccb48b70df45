use anyhow::Context;

use finken_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    finken_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    let bind_addr = config.bind_addr.clone();

    let app = finken_api::app::build_app(config)
        .await
        .context("failed to open the ledger store")?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server terminated")?;
    Ok(())
}
