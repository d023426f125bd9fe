//! OpenSettle API server

use settle_api::{build_router, ApiState};
use settle_common::PlatformConfig;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PlatformConfig::from_env()?;
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(ApiState::new(config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "opensettle api listening");
    axum::serve(listener, app).await?;
    Ok(())
}
