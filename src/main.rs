use anyhow::{Context, Result};
use qris_gateway::{
    app::{build_router, AppState},
    config::{Config, StorageBackend},
    models::Profile,
    services::*,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting QRIS gateway v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {:?}", config.environment);

    // Initialize services
    let store: Arc<dyn DepositStore> = match config.storage_backend {
        StorageBackend::Redis => Arc::new(
            RedisStore::new(&config.redis_url)
                .await
                .context("Failed to connect to Redis")?,
        ),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; deposits are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    if let Some(seed) = &config.seed_profile {
        let existing = store.get_profile(&seed.user_id).await?;
        let profile = Profile {
            user_id: seed.user_id.clone(),
            api_id: seed.api_id.clone(),
            api_key: seed.api_key.clone(),
            // Never reset a live balance.
            balance: existing.map_or(seed.balance, |p| p.balance),
        };
        store.upsert_profile(&profile).await?;
        tracing::info!("Seeded profile for user {}", seed.user_id);
    }

    let provider: Arc<dyn PaymentProvider> = Arc::new(KobaruClient::new(
        config.upstream_api_base.clone(),
        Duration::from_secs(config.upstream_timeout_secs),
    )?);
    let analytics = Arc::new(Analytics::new());

    // Build application state
    let app_state = AppState {
        deposits: Arc::new(DepositService::new(
            store.clone(),
            provider,
            analytics.clone(),
        )),
        credentials: Arc::new(CredentialValidator::new(
            store.clone(),
            Duration::from_secs(config.credential_cache_ttl_secs),
        )),
        store,
        analytics,
    };

    let app = build_router(app_state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Deposits: http://{}/api/v1/deposits", addr);
    tracing::info!("Upstream provider: {}", config.upstream_api_base);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl+c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down gracefully...");
}
