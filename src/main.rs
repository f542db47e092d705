use std::sync::Arc;

use moodreel_api::{
    cache::TtlCache,
    config::Config,
    create_router,
    services::{llm::OpenRouterModel, tmdb::TmdbClient},
    AppState,
};

/// Listing endpoints are cheap to refetch; lookups are stable per title
const LISTING_TTL_SECS: i64 = 600;
const LOOKUP_TTL_SECS: i64 = 7200;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moodreel_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let listing_cache = TtlCache::new(LISTING_TTL_SECS);
    let lookup_cache = TtlCache::new(LOOKUP_TTL_SECS);
    let media = Arc::new(TmdbClient::new(&config, listing_cache, lookup_cache));
    let model = Arc::new(OpenRouterModel::from_config(&config));

    let state = AppState::new(media, model, &config);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
