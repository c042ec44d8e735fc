//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool, typed config, the realtime change hub, the
//! dashboard stats cache and the photo storage backend.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::services::realtime::ChangeHub;
use crate::services::stats::StatsCache;
use crate::services::storage::PhotoStorage;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    /// Committed row changes, fanned out to websockets and the stats refresher.
    pub hub: ChangeHub,
    pub stats: StatsCache,
    pub storage: Arc<dyn PhotoStorage>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: Config, storage: Arc<dyn PhotoStorage>) -> Self {
        let hub = ChangeHub::new(config.change_hub_capacity);
        Self { pool, config: Arc::new(config), hub, stats: StatsCache::new(), storage }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
