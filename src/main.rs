mod config;
mod db;
mod frame;
mod locale;
mod model;
mod routes;
mod services;
mod state;

use std::sync::Arc;
use std::time::Duration;

use services::storage::LocalDiskStorage;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env().expect("invalid configuration");

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    if config.seed_demo_accounts {
        match services::auth::seed_demo_accounts(&pool).await {
            Ok(created) => tracing::info!(created, "demo accounts seeded"),
            Err(e) => tracing::warn!(error = %e, "demo account seeding failed"),
        }
    }
    match services::session::purge_expired(&pool).await {
        Ok(purged) => tracing::info!(purged, "expired sessions purged"),
        Err(e) => tracing::warn!(error = %e, "session purge failed"),
    }

    tokio::fs::create_dir_all(&config.media_dir)
        .await
        .expect("failed to create media dir");
    let storage = Arc::new(LocalDiskStorage::new(config.media_dir.clone(), config.media_url_prefix.clone()));

    let port = config.port;
    let refresh = Duration::from_secs(config.stats_refresh_secs);
    let state = state::AppState::new(pool, config, storage);

    let _stats = services::stats::spawn_stats_refresher(state.pool.clone(), &state.hub, state.stats.clone(), refresh);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "alaobra listening");
    axum::serve(listener, app).await.expect("server failed");
}
