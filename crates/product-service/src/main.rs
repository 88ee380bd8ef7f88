use clap::Parser;
use product_service::{app_state, router, Directory, InMemoryProductStore, Settings, CATEGORY_SERVICE};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "product_service=info,catalog_circuitbreaker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::parse();
    let layer = settings.breaker.layer()?;
    tracing::info!(config = ?layer.config(), "category circuit configured");

    let directory =
        Directory::new().register(CATEGORY_SERVICE, settings.category_endpoints.iter().cloned());
    let state = app_state(
        Arc::new(directory),
        Arc::new(InMemoryProductStore::new()),
        &layer,
    );

    let listener = tokio::net::TcpListener::bind(settings.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        endpoints = ?settings.category_endpoints,
        "product service listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
        })
        .await?;
    Ok(())
}
