mod configuration;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use onir::{providers::factory::DeepSeekFactory, Broker};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("onir=info,onir_server=info")),
        )
        .init();

    // Load configuration
    let settings = configuration::Settings::new()?;

    let factory = DeepSeekFactory::new(settings.provider.to_config());
    let (broker, rx) = Broker::new(Arc::new(factory));
    let state = state::AppState::new(broker, rx, settings.provider.api_key.clone());

    // Create router with CORS support
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state.clone()).layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()?).await?;
    info!("listening on {}", listener.local_addr()?);

    let shutdown = state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::warn!("unable to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutting down");
            shutdown.cancel();
        })
        .await?;

    let cancelled = state.broker.cancel_all();
    if cancelled > 0 {
        info!(cancelled, "cancelled in-flight chat requests");
    }
    Ok(())
}
