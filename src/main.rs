use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use coaching_pricing::cache::{start_cache_warmer, AppCache};
use coaching_pricing::config::AppConfig;
use coaching_pricing::pricing::{PgPricingStore, PricingStore, SystemClock};
use coaching_pricing::{app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("coaching_pricing=info,tower_http=info")),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    info!(max_connections = config.db_max_connections, "connected to database");

    let store: Arc<dyn PricingStore> = Arc::new(PgPricingStore::new(pool));
    let cache = AppCache::new(config.cache_ttl);

    tokio::spawn(start_cache_warmer(
        cache.clone(),
        store.clone(),
        config.cache_warm_interval,
    ));

    let state = AppState {
        store,
        cache,
        clock: Arc::new(SystemClock),
        currency: config.currency.clone(),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "pricing service listening");
    axum::serve(listener, app(state)).await?;

    Ok(())
}
