use consorcio_api::config::Config;
use consorcio_api::handlers::{self, AppState};
use consorcio_api::store::EntityStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes tracing, loads configuration, seeds the in-memory entity
/// store, builds the shared state (rate limiter, response cache, auth
/// subsystem), and starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "consorcio_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Volatile store: seeded at startup, reset on restart.
    let store = Arc::new(EntityStore::seeded());
    tracing::info!("Entity store seeded");

    let state = Arc::new(AppState::new(config.clone(), store));
    let app = handlers::router(state);

    // Start server. Connect info feeds the per-IP rate-limit key for callers
    // that send no API key.
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
