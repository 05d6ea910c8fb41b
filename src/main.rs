//! LoveMatch backend server
//!
//! HTTP/JSON API for a dating and companionship platform.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lovematch_server::{
    routes, AppState, Config, InMemoryStore, SqliteStore, Store, StripeIdentity, StripePayments,
};

/// How often idle signaling rooms are swept
const SIGNALING_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lovematch_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!(port = config.port, "Loaded configuration");

    match config.database.clone() {
        Some(path) => {
            tracing::info!(%path, "Using SQLite storage");
            let store = SqliteStore::open(&path)?;
            serve(store, config).await
        }
        None => {
            tracing::warn!("No DATABASE_PATH set, using in-memory storage");
            serve(InMemoryStore::new(), config).await
        }
    }
}

async fn serve<S: Store + 'static>(store: S, config: Config) -> Result<()> {
    let payments = StripePayments::new();
    let identity = StripeIdentity::new(config.stripe_secret_key.clone().unwrap_or_default());

    let state = Arc::new(AppState::new(store, payments, identity, config));

    // Sweep abandoned signaling rooms in the background
    let signaling = Arc::clone(&state.signaling);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SIGNALING_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let evicted = signaling.sweep_expired();
            if evicted > 0 {
                tracing::debug!(evicted, "Swept idle signaling rooms");
            }
        }
    });

    let app = routes::create_router(Arc::clone(&state));

    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
