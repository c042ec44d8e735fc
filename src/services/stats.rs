//! Admin dashboard counters and per-worker performance.
//!
//! DESIGN
//! ======
//! Dashboard counters are independent `count(*)` queries run concurrently.
//! A [`StatsCache`] keeps the last result until a published write to a
//! counted table invalidates it or the UTC day rolls over. A background task
//! recomputes it on a fixed interval when the change hub reported such a
//! write, so most dashboard loads find a valid snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

use super::check_in::start_of_utc_day;
use super::realtime::{Change, ChangeHub, Table};
use crate::model::{Profile, Task, TaskStatus};

/// Recent tasks listed per worker.
pub const RECENT_TASKS_PER_WORKER: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub active_projects: i64,
    pub total_workers: i64,
    pub active_check_ins: i64,
    pub open_issues: i64,
    pub pending_reviews: i64,
    pub completed_today: i64,
    pub average_progress: f64,
    pub computed_at: DateTime<Utc>,
}

pub async fn dashboard_stats(pool: &PgPool, now: DateTime<Utc>) -> Result<DashboardStats, sqlx::Error> {
    let (active_projects, total_workers, active_check_ins, open_issues, pending_reviews, completed_today, average_progress) = tokio::try_join!(
        count(pool, "SELECT count(*) FROM projects WHERE status IN ('in_progress', 'planning')"),
        count(pool, "SELECT count(*) FROM profiles WHERE role = 'worker' AND is_active"),
        count(pool, "SELECT count(*) FROM check_ins WHERE check_out_time IS NULL"),
        count(pool, "SELECT count(*) FROM issues WHERE status = 'open'"),
        count(pool, "SELECT count(*) FROM tasks WHERE status = 'review'"),
        sqlx::query_scalar::<_, i64>(
            "SELECT count(*) FROM tasks WHERE status = 'approved' AND completed_at >= $1",
        )
        .bind(start_of_utc_day(now))
        .fetch_one(pool),
        sqlx::query_scalar::<_, Option<f64>>(
            "SELECT avg(progress_percentage)::float8 FROM projects WHERE status IN ('in_progress', 'planning')",
        )
        .fetch_one(pool),
    )?;
    Ok(DashboardStats {
        active_projects,
        total_workers,
        active_check_ins,
        open_issues,
        pending_reviews,
        completed_today,
        average_progress: average_progress.unwrap_or(0.0),
        computed_at: now,
    })
}

async fn count(pool: &PgPool, sql: &'static str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(sql).fetch_one(pool).await
}

// =============================================================================
// WORKER STATS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerStats {
    pub worker: Profile,
    pub total_tasks: usize,
    pub approved_tasks: usize,
    pub rejected_tasks: usize,
    /// Mean quality score over approved, scored tasks. `None` when there are none.
    pub average_quality: Option<f64>,
    pub recent_tasks: Vec<Task>,
}

/// Summarize one worker's tasks. `tasks` may be in any order.
#[must_use]
pub fn summarize_worker(worker: Profile, mut tasks: Vec<Task>) -> WorkerStats {
    let approved: Vec<&Task> = tasks.iter().filter(|t| t.status == TaskStatus::Approved).collect();
    let scores: Vec<f64> = approved.iter().filter_map(|t| t.quality_score).map(f64::from).collect();
    #[allow(clippy::cast_precision_loss)]
    let average_quality = (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);
    let approved_tasks = approved.len();
    let rejected_tasks = tasks.iter().filter(|t| t.status == TaskStatus::Rejected).count();
    let total_tasks = tasks.len();

    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    tasks.truncate(RECENT_TASKS_PER_WORKER);

    WorkerStats { worker, total_tasks, approved_tasks, rejected_tasks, average_quality, recent_tasks: tasks }
}

/// Every active worker with their task summary, most approved first.
pub async fn worker_stats(pool: &PgPool) -> Result<Vec<WorkerStats>, sqlx::Error> {
    let (workers, tasks) = tokio::try_join!(
        super::profile::list_active_workers(pool),
        sqlx::query_as::<_, Task>(
            r"SELECT t.* FROM tasks t
              JOIN profiles w ON w.id = t.assigned_to
              WHERE w.role = 'worker' AND w.is_active",
        )
        .fetch_all(pool),
    )?;

    let mut by_worker: HashMap<uuid::Uuid, Vec<Task>> = HashMap::new();
    for task in tasks {
        if let Some(worker_id) = task.assigned_to {
            by_worker.entry(worker_id).or_default().push(task);
        }
    }

    let mut stats: Vec<WorkerStats> = workers
        .into_iter()
        .map(|w| {
            let tasks = by_worker.remove(&w.id).unwrap_or_default();
            summarize_worker(w, tasks)
        })
        .collect();
    stats.sort_by(|a, b| b.approved_tasks.cmp(&a.approved_tasks));
    Ok(stats)
}

// =============================================================================
// CACHE & REFRESHER
// =============================================================================

#[derive(Debug, Clone)]
struct Snapshot {
    stats: DashboardStats,
    generation: u64,
}

/// Last computed dashboard counters, shared across handlers.
///
/// Every published write to a counted table bumps the generation through
/// [`StatsCache::invalidate`]. A snapshot is served only while its generation
/// is current and it was computed on the same UTC day, so a request always
/// sees the counts its queries would return.
#[derive(Clone, Default)]
pub struct StatsCache {
    inner: Arc<RwLock<Option<Snapshot>>>,
    generation: Arc<AtomicU64>,
}

impl StatsCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the stored snapshot stale.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// The stored snapshot when it is still valid at `now`.
    pub async fn fresh(&self, now: DateTime<Utc>) -> Option<DashboardStats> {
        let current = self.generation.load(Ordering::SeqCst);
        let guard = self.inner.read().await;
        let snapshot = guard.as_ref()?;
        let same_day = snapshot.stats.computed_at.date_naive() == now.date_naive();
        (snapshot.generation == current && same_day).then(|| snapshot.stats.clone())
    }

    /// Store counters computed at the current generation.
    pub async fn store(&self, stats: DashboardStats) {
        let generation = self.generation.load(Ordering::SeqCst);
        self.store_at(stats, generation).await;
    }

    async fn store_at(&self, stats: DashboardStats, generation: u64) {
        *self.inner.write().await = Some(Snapshot { stats, generation });
    }

    /// Valid cached counters, recomputing them when cold or stale.
    pub async fn get_or_refresh(&self, pool: &PgPool) -> Result<DashboardStats, sqlx::Error> {
        if let Some(stats) = self.fresh(Utc::now()).await {
            return Ok(stats);
        }
        self.refresh(pool).await
    }

    pub async fn refresh(&self, pool: &PgPool) -> Result<DashboardStats, sqlx::Error> {
        // Read before querying: a write that lands mid-query leaves the result stale.
        let generation = self.generation.load(Ordering::SeqCst);
        let stats = dashboard_stats(pool, Utc::now()).await?;
        self.store_at(stats.clone(), generation).await;
        Ok(stats)
    }
}

/// Whether a change can move any dashboard counter.
#[must_use]
pub fn affects_dashboard(change: &Change) -> bool {
    matches!(
        change.table,
        Table::Projects | Table::Profiles | Table::CheckIns | Table::Issues | Table::Tasks
    )
}

/// Spawn the stats refresher. Returns a handle for shutdown.
pub fn spawn_stats_refresher(pool: PgPool, hub: &ChangeHub, cache: StatsCache, period: Duration) -> JoinHandle<()> {
    let mut changes = hub.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first refresh happens on the first tick.
        let mut dirty = true;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !dirty {
                        continue;
                    }
                    match cache.refresh(&pool).await {
                        Ok(stats) => {
                            dirty = false;
                            debug!(active_projects = stats.active_projects, open_issues = stats.open_issues, "dashboard stats refreshed");
                        }
                        Err(e) => error!(error = %e, "dashboard stats refresh failed"),
                    }
                }
                received = changes.recv() => match received {
                    Ok(change) => dirty |= affects_dashboard(&change),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "stats refresher lagged behind change hub");
                        dirty = true;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}

#[cfg(test)]
#[path = "stats_test.rs"]
mod tests;
